//! Task: apply the workload environment.

use super::{InitCtx, log_task_error, task_start};
use crate::env::apply_environment;
use crate::pipeline::PipelineTask;
use vminit_shared::InitResult;

pub struct EnvironmentTask;

impl<'a> PipelineTask<InitCtx<'a>> for EnvironmentTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        let identity = ctx.identity()?.clone();
        let entries = ctx.config.workload_env();
        let env = apply_environment(ctx.world, &entries, &identity)
            .inspect_err(|e| log_task_error(task_name, e))?;
        tracing::debug!(vars = env.len(), "Workload environment applied");
        ctx.env = Some(env);
        Ok(())
    }

    fn name(&self) -> &str {
        "environment"
    }
}
