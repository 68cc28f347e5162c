//! Task: mount configured extra drives.

use super::{InitCtx, log_task_error, task_start};
use crate::mount::mount_additional_drives;
use crate::pipeline::PipelineTask;
use vminit_shared::InitResult;

pub struct AdditionalDrivesTask;

impl<'a> PipelineTask<InitCtx<'a>> for AdditionalDrivesTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        let identity = ctx.identity()?.clone();
        mount_additional_drives(ctx.world, &ctx.config.mounts, &identity)
            .inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "additional_drives"
    }
}
