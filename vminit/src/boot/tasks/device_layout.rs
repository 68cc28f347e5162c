//! Task: directories and symlinks expected under /dev, /run and /.
//!
//! Runs after the kernel filesystems are mounted: `/run/lock` lives on the
//! `/run` tmpfs and the `/dev` links point into `/proc`.

use super::{InitCtx, log_task_error, task_start};
use crate::constants::modes;
use crate::pipeline::PipelineTask;
use crate::world::{World, ensure_dir};
use nix::errno::Errno;
use nix::sys::stat::Mode;
use std::path::Path;
use vminit_shared::{InitError, InitResult};

const DEV_LINKS: &[(&str, &str)] = &[
    ("/proc/self/fd", "/dev/fd"),
    ("/proc/self/fd/0", "/dev/stdin"),
    ("/proc/self/fd/1", "/dev/stdout"),
    ("/proc/self/fd/2", "/dev/stderr"),
];

pub struct DeviceLayoutTask;

impl<'a> PipelineTask<InitCtx<'a>> for DeviceLayoutTask {
    fn run(&self, ctx: &mut InitCtx<'a>) -> InitResult<()> {
        let task_name = self.name();
        task_start(task_name);

        run_device_layout(ctx.world).inspect_err(|e| log_task_error(task_name, e))
    }

    fn name(&self) -> &str {
        "device_layout"
    }
}

fn run_device_layout(world: &mut dyn World) -> InitResult<()> {
    create_dir(world, "/run/lock", modes::DIR_1777)?;
    // mkdir is masked by the umask; the sticky world-writable mode must be exact.
    world
        .chmod(Path::new("/run/lock"), Mode::from_bits_truncate(modes::DIR_1777))
        .map_err(|e| InitError::Storage(format!("failed to chmod /run/lock: {}", e)))?;

    for (original, link) in DEV_LINKS {
        match world.symlink(Path::new(original), Path::new(link)) {
            Ok(()) | Err(Errno::EEXIST) => {}
            Err(e) => {
                return Err(InitError::Storage(format!(
                    "failed to link {} -> {}: {}",
                    link, original, e
                )));
            }
        }
    }

    create_dir(world, "/root", modes::DIR_0700)
}

fn create_dir(world: &mut dyn World, path: &str, mode: u32) -> InitResult<()> {
    ensure_dir(world, Path::new(path), Mode::from_bits_truncate(mode))
        .map(|_| ())
        .map_err(|e| InitError::Storage(format!("failed to create {}: {}", path, e)))
}
