//! Task: build the workload's argument vector.

use super::{InitCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use crate::process::ResolvedProcess;
use vminit_shared::InitResult;

pub struct ProcessBuildTask;

impl<'a> PipelineTask<InitCtx<'a>> for ProcessBuildTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        let env = ctx.env.take().unwrap_or_default();
        let process = ResolvedProcess::build(ctx.config, env)
            .inspect_err(|e| log_task_error(task_name, e))?;
        ctx.process = Some(process);
        Ok(())
    }

    fn name(&self) -> &str {
        "process_build"
    }
}
