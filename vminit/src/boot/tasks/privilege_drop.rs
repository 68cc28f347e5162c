//! Task: switch to the workload identity.

use super::{InitCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use crate::privilege::drop_privileges;
use vminit_shared::InitResult;

pub struct PrivilegeDropTask;

impl<'a> PipelineTask<InitCtx<'a>> for PrivilegeDropTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        let identity = ctx.identity()?.clone();
        drop_privileges(ctx.world, &identity).inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "privilege_drop"
    }
}
