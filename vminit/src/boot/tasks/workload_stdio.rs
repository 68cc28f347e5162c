//! Task: prepare the workload's stdio while init is still root.

use super::{InitCtx, log_task_error, task_start};
use crate::identity::Identity;
use crate::pipeline::PipelineTask;
use crate::process::WorkloadStdio;
use crate::world::World;
use vminit_shared::{InitError, InitResult};

pub struct WorkloadStdioTask;

impl<'a> PipelineTask<InitCtx<'a>> for WorkloadStdioTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        let identity = ctx.identity()?.clone();
        let stdio = prepare_stdio(ctx.world, ctx.config.tty_enabled(), &identity)
            .inspect_err(|e| log_task_error(task_name, e))?;
        ctx.stdio = Some(stdio);
        Ok(())
    }

    fn name(&self) -> &str {
        "workload_stdio"
    }
}

/// The pty itself is allocated at launch. For inherited stdio the console
/// descriptors are reopened and handed to the workload identity, which could
/// not open them after the privilege drop.
fn prepare_stdio(
    world: &mut dyn World,
    tty: bool,
    identity: &Identity,
) -> InitResult<WorkloadStdio> {
    if tty {
        return Ok(WorkloadStdio::Pty);
    }

    let console = world
        .open_console_stdio()
        .map_err(|e| InitError::Storage(format!("failed to open console stdio: {}", e)))?;
    for fd in console.fds() {
        world
            .fchown(fd, identity.uid, identity.gid)
            .map_err(|e| InitError::Storage(format!("failed to chown console stdio: {}", e)))?;
    }
    Ok(WorkloadStdio::Inherited(console))
}
