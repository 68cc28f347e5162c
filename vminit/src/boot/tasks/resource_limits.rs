//! Task: raise RLIMIT_NOFILE while still privileged.

use super::{InitCtx, log_task_error, task_start};
use crate::constants::limits;
use crate::pipeline::PipelineTask;
use vminit_shared::{InitError, InitResult};

pub struct ResourceLimitsTask;

impl<'a> PipelineTask<InitCtx<'a>> for ResourceLimitsTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        ctx.world
            .set_nofile_limit(limits::NOFILE)
            .map_err(|e| {
                InitError::Credentials(format!(
                    "failed to set RLIMIT_NOFILE to {}: {}",
                    limits::NOFILE,
                    e
                ))
            })
            .inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "resource_limits"
    }
}
