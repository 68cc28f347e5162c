//! Task: loopback and primary link up.

use super::{InitCtx, log_task_error, task_start};
use crate::constants::network;
use crate::pipeline::PipelineTask;
use vminit_shared::InitResult;

pub struct NetworkTask;

impl<'a> PipelineTask<InitCtx<'a>> for NetworkTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        ctx.network
            .bring_up(&[network::LOOPBACK, network::PRIMARY])
            .inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "network"
    }
}
