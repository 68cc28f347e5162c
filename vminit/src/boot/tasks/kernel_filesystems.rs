//! Task: mount /dev/pts, /proc, /sys, /run and friends.

use super::{InitCtx, log_task_error, task_start};
use crate::mount::table::kernel_filesystems;
use crate::pipeline::PipelineTask;
use vminit_shared::InitResult;

pub struct KernelFilesystemsTask;

impl<'a> PipelineTask<InitCtx<'a>> for KernelFilesystemsTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        kernel_filesystems()
            .execute(ctx.world)
            .inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "kernel_filesystems"
    }
}
