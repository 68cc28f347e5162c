//! Irreversible switch from root to the workload identity.

use crate::identity::Identity;
use crate::world::World;
use vminit_shared::{InitError, InitResult};

/// Supplementary groups, then gid, then uid.
///
/// The gid must change while the process still holds root; once the uid is
/// dropped it no longer can. The first failure stops the sequence.
pub fn drop_privileges(world: &mut dyn World, identity: &Identity) -> InitResult<()> {
    tracing::info!(
        uid = identity.uid.as_raw(),
        gid = identity.gid.as_raw(),
        "Dropping privileges"
    );

    world
        .setgroups(&[identity.gid])
        .map_err(|e| InitError::Credentials(format!("setgroups([{}]): {}", identity.gid, e)))?;
    world
        .setgid(identity.gid)
        .map_err(|e| InitError::Credentials(format!("setgid({}): {}", identity.gid, e)))?;
    world
        .setuid(identity.uid)
        .map_err(|e| InitError::Credentials(format!("setuid({}): {}", identity.uid, e)))?;
    Ok(())
}
