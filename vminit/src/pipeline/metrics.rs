#[derive(Debug, Clone)]
pub struct TaskMetrics {
    pub name: String,
    pub duration_ms: u128,
}

#[derive(Debug, Clone)]
pub struct StageMetrics {
    pub index: usize,
    pub name: &'static str,
    pub duration_ms: u128,
    pub tasks: Vec<TaskMetrics>,
}

#[derive(Debug, Clone)]
pub struct PipelineMetrics {
    pub total_duration_ms: u128,
    pub stages: Vec<StageMetrics>,
}

impl PipelineMetrics {
    /// Task names in execution order.
    pub fn task_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.tasks.iter())
            .map(|task| task.name.as_str())
            .collect()
    }

    pub fn log_summary(&self) {
        for stage in &self.stages {
            tracing::debug!(
                index = stage.index,
                stage = stage.name,
                duration_ms = stage.duration_ms as u64,
                "Boot stage timing"
            );
            for task in &stage.tasks {
                tracing::info!(
                    stage = stage.name,
                    task = %task.name,
                    duration_ms = task.duration_ms as u64,
                    "Boot task timing"
                );
            }
        }
        tracing::info!(
            total_duration_ms = self.total_duration_ms as u64,
            "Boot pipeline complete"
        );
    }
}
