//! Extra block devices requested by the machine configuration.

use crate::constants::{fstype, modes};
use crate::identity::Identity;
use crate::world::{World, ensure_dir};
use nix::mount::MsFlags;
use nix::sys::stat::Mode;
use std::path::Path;
use vminit_shared::{InitError, InitResult, MountRequest};

/// Mount each requested drive and hand it to the workload identity.
///
/// Directory creation problems are only logged: the mount that follows
/// reports the real failure if the target is unusable. Mount and chown
/// failures abort the remaining requests.
pub fn mount_additional_drives(
    world: &mut dyn World,
    requests: &[MountRequest],
    identity: &Identity,
) -> InitResult<()> {
    for request in requests {
        let target = Path::new(&request.mount_path);

        match ensure_dir(world, target, Mode::from_bits_truncate(modes::DIR_0755)) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(path = %target.display(), "Drive mount point already exists")
            }
            Err(e) => tracing::warn!(
                path = %target.display(),
                error = %e,
                "Failed to create drive mount point"
            ),
        }

        tracing::info!(
            device = %request.device_path,
            path = %target.display(),
            "Mounting additional drive"
        );
        world
            .mount(
                Some(&request.device_path),
                target,
                Some(fstype::JOURNALING),
                MsFlags::MS_RELATIME,
                None,
            )
            .map_err(|e| {
                InitError::Mount(format!(
                    "failed to mount {} at {}: {}",
                    request.device_path,
                    target.display(),
                    e
                ))
            })?;

        world
            .chown(target, identity.uid, identity.gid)
            .map_err(|e| {
                InitError::Storage(format!(
                    "failed to chown {} to {}:{}: {}",
                    target.display(),
                    identity.uid,
                    identity.gid,
                    e
                ))
            })?;
    }
    Ok(())
}
