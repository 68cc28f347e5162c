//! Task: switch to the guest root device.

use super::{InitCtx, log_task_error, task_start};
use crate::pipeline::PipelineTask;
use crate::root_switch::RootSwitch;
use vminit_shared::InitResult;

pub struct RootSwitchTask;

impl<'a> PipelineTask<InitCtx<'a>> for RootSwitchTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        RootSwitch::new(&ctx.config.root_device, ctx.config.root_switch)
            .run(ctx.world)
            .inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "root_switch"
    }
}
