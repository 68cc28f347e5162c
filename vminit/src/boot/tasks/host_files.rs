//! Task: hostname, /etc/hosts and /etc/resolv.conf.

use super::{InitCtx, log_task_error, task_start};
use crate::network::etc::write_host_files;
use crate::pipeline::PipelineTask;
use vminit_shared::InitResult;

pub struct HostFilesTask;

impl<'a> PipelineTask<InitCtx<'a>> for HostFilesTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        let config = ctx.config;
        write_host_files(
            ctx.world,
            &config.hostname,
            &config.etc_host,
            &config.etc_resolv,
        )
        .inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "host_files"
    }
}
