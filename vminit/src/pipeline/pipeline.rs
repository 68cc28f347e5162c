//! Pipeline executor.

use super::metrics::{PipelineMetrics, StageMetrics, TaskMetrics};
use super::stage::Stage;
use super::task::BoxedTask;
use std::time::Instant;
use vminit_shared::InitResult;

pub struct ExecutionPlan<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> ExecutionPlan<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }

    pub fn stages(self) -> Vec<Stage<BoxedTask<Ctx>>> {
        self.stages
    }

    /// `(stage, task)` names in execution order.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        self.stages
            .iter()
            .flat_map(|stage| {
                stage
                    .tasks
                    .iter()
                    .map(move |task| (stage.name, task.name().to_string()))
            })
            .collect()
    }
}

pub struct Pipeline<Ctx> {
    stages: Vec<Stage<BoxedTask<Ctx>>>,
}

impl<Ctx> Pipeline<Ctx> {
    pub fn new(stages: Vec<Stage<BoxedTask<Ctx>>>) -> Self {
        Self { stages }
    }
}

pub struct PipelineBuilder;

impl PipelineBuilder {
    pub fn from_plan<Ctx>(plan: ExecutionPlan<Ctx>) -> Pipeline<Ctx> {
        Pipeline::new(plan.stages())
    }
}

pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Run every stage and task in order against `ctx`.
    ///
    /// The first task error stops execution and is returned wrapped with the
    /// task's name.
    pub fn execute<Ctx>(pipeline: Pipeline<Ctx>, ctx: &mut Ctx) -> InitResult<PipelineMetrics> {
        let total_start = Instant::now();
        let mut stage_metrics = Vec::new();

        for (index, stage) in pipeline.stages.into_iter().enumerate() {
            let stage_start = Instant::now();
            tracing::debug!(stage = stage.name, tasks = stage.tasks.len(), "Entering stage");

            let mut task_metrics = Vec::with_capacity(stage.tasks.len());
            for task in stage.tasks {
                let name = task.name().to_string();
                let task_start = Instant::now();
                task.run(ctx).map_err(|e| e.in_task(&name))?;
                task_metrics.push(TaskMetrics {
                    name,
                    duration_ms: task_start.elapsed().as_millis(),
                });
            }

            stage_metrics.push(StageMetrics {
                index,
                name: stage.name,
                duration_ms: stage_start.elapsed().as_millis(),
                tasks: task_metrics,
            });
        }

        Ok(PipelineMetrics {
            total_duration_ms: total_start.elapsed().as_millis(),
            stages: stage_metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineTask;
    use vminit_shared::InitError;

    struct Push(&'static str);

    impl PipelineTask<Vec<&'static str>> for Push {
        fn run(&self, ctx: &mut Vec<&'static str>) -> InitResult<()> {
            ctx.push(self.0);
            Ok(())
        }

        fn name(&self) -> &str {
            self.0
        }
    }

    struct Fail;

    impl PipelineTask<Vec<&'static str>> for Fail {
        fn run(&self, _ctx: &mut Vec<&'static str>) -> InitResult<()> {
            Err(InitError::Mount("boom".into()))
        }

        fn name(&self) -> &str {
            "fail"
        }
    }

    #[test]
    fn test_runs_stages_and_tasks_in_order() {
        let plan = ExecutionPlan::new(vec![
            Stage::new("one", vec![Box::new(Push("a")) as BoxedTask<_>, Box::new(Push("b"))]),
            Stage::new("two", vec![Box::new(Push("c")) as BoxedTask<_>]),
        ]);
        assert_eq!(
            plan.describe(),
            vec![
                ("one", "a".to_string()),
                ("one", "b".to_string()),
                ("two", "c".to_string())
            ]
        );

        let mut ctx = Vec::new();
        let metrics =
            PipelineExecutor::execute(PipelineBuilder::from_plan(plan), &mut ctx).unwrap();

        assert_eq!(ctx, vec!["a", "b", "c"]);
        assert_eq!(metrics.task_names(), vec!["a", "b", "c"]);
        assert_eq!(metrics.stages[1].name, "two");
        assert_eq!(metrics.stages[1].index, 1);
        assert_eq!(metrics.stages[0].tasks.len(), 2);
    }

    #[test]
    fn test_stops_at_first_failure() {
        let plan = ExecutionPlan::new(vec![
            Stage::new("one", vec![Box::new(Push("a")) as BoxedTask<_>, Box::new(Fail)]),
            Stage::new("two", vec![Box::new(Push("c")) as BoxedTask<_>]),
        ]);

        let mut ctx = Vec::new();
        let err =
            PipelineExecutor::execute(PipelineBuilder::from_plan(plan), &mut ctx).unwrap_err();

        assert_eq!(ctx, vec!["a"]);
        assert_eq!(err.to_string(), "fail failed: mount error: boom");
        assert!(matches!(err, InitError::Task { ref task, .. } if task == "fail"));
    }
}
