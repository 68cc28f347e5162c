//! Replacing the initial in-memory root with the guest's root device.
//!
//! The switch is a linear state machine. Every transition is a single
//! kernel operation (or a small group of them); a failure leaves the machine
//! in the last reached state and the error names the state that could not be
//! entered.

use crate::constants::{fstype, modes, paths};
use crate::world::{World, ensure_dir};
use nix::mount::MsFlags;
use nix::sys::stat::Mode;
use std::fmt;
use std::path::{Path, PathBuf};
use vminit_shared::{InitError, InitResult, RootSwitchMode};

/// Progress of the root switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RootSwitchState {
    InitialRoot,
    DeviceFsMounted,
    NewRootMounted,
    DeviceFsMovedIntoNewRoot,
    TemporaryRootReclaimed,
    CurrentDirectoryIsNewRoot,
    RootMovedOntoSelf,
    ChrootEntered,
    WorkingDirectoryIsRoot,
}

impl fmt::Display for RootSwitchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InitialRoot => "initial root",
            Self::DeviceFsMounted => "device filesystem mounted",
            Self::NewRootMounted => "new root mounted",
            Self::DeviceFsMovedIntoNewRoot => "device filesystem moved into new root",
            Self::TemporaryRootReclaimed => "temporary root reclaimed",
            Self::CurrentDirectoryIsNewRoot => "current directory is new root",
            Self::RootMovedOntoSelf => "root moved onto itself",
            Self::ChrootEntered => "chroot entered",
            Self::WorkingDirectoryIsRoot => "working directory is root",
        };
        f.write_str(name)
    }
}

/// Drives the root switch for one boot.
#[derive(Debug)]
pub struct RootSwitch {
    device: String,
    mode: RootSwitchMode,
    new_root: PathBuf,
    state: RootSwitchState,
}

impl RootSwitch {
    /// An empty `device` selects the default root device.
    pub fn new(device: &str, mode: RootSwitchMode) -> Self {
        let device = if device.is_empty() {
            paths::DEFAULT_ROOT_DEVICE.to_string()
        } else {
            device.to_string()
        };
        Self {
            device,
            mode,
            new_root: PathBuf::from(paths::NEW_ROOT),
            state: RootSwitchState::InitialRoot,
        }
    }

    pub fn state(&self) -> RootSwitchState {
        self.state
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Run every transition up to [`RootSwitchState::WorkingDirectoryIsRoot`].
    pub fn run(&mut self, world: &mut dyn World) -> InitResult<()> {
        tracing::info!(device = %self.device, mode = ?self.mode, "Switching root");

        self.enter(RootSwitchState::DeviceFsMounted, || {
            ensure_dir(world, Path::new("/dev"), Mode::from_bits_truncate(modes::DIR_0755))?;
            world.mount(
                Some("devtmpfs"),
                Path::new("/dev"),
                Some("devtmpfs"),
                MsFlags::MS_NOSUID,
                Some("mode=0755"),
            )
        })?;

        let device = self.device.clone();
        let new_root = self.new_root.clone();
        self.enter(RootSwitchState::NewRootMounted, || {
            ensure_dir(world, &new_root, Mode::from_bits_truncate(modes::DIR_0755))?;
            world.mount(
                Some(&device),
                &new_root,
                Some(fstype::JOURNALING),
                MsFlags::MS_RELATIME,
                None,
            )
        })?;

        self.enter(RootSwitchState::DeviceFsMovedIntoNewRoot, || {
            world.mount(
                Some("/dev"),
                &new_root.join("dev"),
                None,
                MsFlags::MS_MOVE,
                None,
            )
        })?;

        self.enter(RootSwitchState::TemporaryRootReclaimed, || {
            world.remove_all(Path::new(paths::STAGING_DIR))
        })?;

        match self.mode {
            RootSwitchMode::Move => self.move_onto_root(world),
            RootSwitchMode::Pivot => self.pivot_onto_root(world),
        }?;

        tracing::info!("Root switch complete");
        Ok(())
    }

    fn move_onto_root(&mut self, world: &mut dyn World) -> InitResult<()> {
        let new_root = self.new_root.clone();
        self.enter(RootSwitchState::CurrentDirectoryIsNewRoot, || {
            world.chdir(&new_root)
        })?;
        self.enter(RootSwitchState::RootMovedOntoSelf, || {
            world.mount(Some("."), Path::new("/"), None, MsFlags::MS_MOVE, None)
        })?;
        self.enter(RootSwitchState::ChrootEntered, || {
            world.chroot(Path::new("."))
        })?;
        self.enter(RootSwitchState::WorkingDirectoryIsRoot, || {
            world.chdir(Path::new("/"))
        })
    }

    /// pivot_root(2) variant: the new root is bind-mounted onto itself so it
    /// is a mount point, and the old root is parked inside it and detached.
    fn pivot_onto_root(&mut self, world: &mut dyn World) -> InitResult<()> {
        let new_root = self.new_root.clone();
        let put_old = new_root.join(paths::PIVOT_OLD_ROOT);

        self.enter(RootSwitchState::CurrentDirectoryIsNewRoot, || {
            let root = new_root.to_string_lossy();
            world.mount(
                Some(&root),
                &new_root,
                None,
                MsFlags::MS_BIND | MsFlags::MS_REC,
                None,
            )?;
            world.chdir(&new_root)
        })?;
        self.enter(RootSwitchState::RootMovedOntoSelf, || {
            ensure_dir(world, &put_old, Mode::from_bits_truncate(modes::DIR_0700))?;
            world.pivot_root(&new_root, &put_old)
        })?;
        self.enter(RootSwitchState::ChrootEntered, || {
            world.chdir(Path::new("/"))
        })?;
        self.enter(RootSwitchState::WorkingDirectoryIsRoot, || {
            let old = Path::new("/").join(paths::PIVOT_OLD_ROOT);
            world.umount_detach(&old)?;
            world.remove_dir(&old)
        })
    }

    fn enter<T>(
        &mut self,
        next: RootSwitchState,
        op: impl FnOnce() -> nix::Result<T>,
    ) -> InitResult<T> {
        let out = op().map_err(|e| {
            InitError::Mount(format!(
                "root switch failed entering '{}' from '{}': {}",
                next, self.state, e
            ))
        })?;
        tracing::debug!(state = %next, "Root switch transition");
        self.state = next;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Op, RecordingWorld};
    use nix::errno::Errno;

    #[test]
    fn test_move_switch_sequence() {
        let mut world = RecordingWorld::new().with_dir("/thi");
        let mut switch = RootSwitch::new("/dev/vda", RootSwitchMode::Move);
        switch.run(&mut world).unwrap();

        assert_eq!(switch.state(), RootSwitchState::WorkingDirectoryIsRoot);
        assert_eq!(
            world.ops(),
            &[
                Op::Mkdir {
                    path: PathBuf::from("/dev"),
                    mode: 0o755
                },
                Op::Mount {
                    source: Some("devtmpfs".into()),
                    target: PathBuf::from("/dev"),
                    fstype: Some("devtmpfs".into()),
                    flags: MsFlags::MS_NOSUID,
                    data: Some("mode=0755".into()),
                },
                Op::Mkdir {
                    path: PathBuf::from("/newroot"),
                    mode: 0o755
                },
                Op::Mount {
                    source: Some("/dev/vda".into()),
                    target: PathBuf::from("/newroot"),
                    fstype: Some("ext4".into()),
                    flags: MsFlags::MS_RELATIME,
                    data: None,
                },
                Op::Mount {
                    source: Some("/dev".into()),
                    target: PathBuf::from("/newroot/dev"),
                    fstype: None,
                    flags: MsFlags::MS_MOVE,
                    data: None,
                },
                Op::RemoveAll(PathBuf::from("/thi")),
                Op::Chdir(PathBuf::from("/newroot")),
                Op::Mount {
                    source: Some(".".into()),
                    target: PathBuf::from("/"),
                    fstype: None,
                    flags: MsFlags::MS_MOVE,
                    data: None,
                },
                Op::Chroot(PathBuf::from(".")),
                Op::Chdir(PathBuf::from("/")),
            ]
        );
        assert!(!world.dir_exists("/thi"));
    }

    #[test]
    fn test_empty_device_uses_default() {
        let switch = RootSwitch::new("", RootSwitchMode::Move);
        assert_eq!(switch.device(), "/dev/vdb");
    }

    #[test]
    fn test_existing_dev_and_newroot_tolerated() {
        let mut world = RecordingWorld::new().with_dir("/dev").with_dir("/newroot");
        RootSwitch::new("", RootSwitchMode::Move)
            .run(&mut world)
            .unwrap();
    }

    #[test]
    fn test_failure_names_state_and_stops() {
        let mut world = RecordingWorld::new().fail_when(
            |op| op.mount_target() == Some(Path::new("/newroot")),
            Errno::ENXIO,
        );
        let mut switch = RootSwitch::new("/dev/vdz", RootSwitchMode::Move);
        let err = switch.run(&mut world).unwrap_err();

        assert!(matches!(err, InitError::Mount(_)));
        assert!(err.to_string().contains("new root mounted"));
        assert_eq!(switch.state(), RootSwitchState::DeviceFsMounted);
        assert_eq!(world.count(|op| matches!(op, Op::RemoveAll(_))), 0);
    }

    #[test]
    fn test_staging_removal_failure_is_fatal() {
        let mut world = RecordingWorld::new()
            .fail_when(|op| matches!(op, Op::RemoveAll(_)), Errno::EBUSY);
        let mut switch = RootSwitch::new("", RootSwitchMode::Move);
        let err = switch.run(&mut world).unwrap_err();
        assert!(err.to_string().contains("temporary root reclaimed"));
        assert_eq!(world.count(|op| matches!(op, Op::Chroot(_))), 0);
    }

    #[test]
    fn test_pivot_switch_sequence() {
        let mut world = RecordingWorld::new();
        let mut switch = RootSwitch::new("", RootSwitchMode::Pivot);
        switch.run(&mut world).unwrap();

        let tail: Vec<Op> = world.ops()[6..].to_vec();
        assert_eq!(
            tail,
            vec![
                Op::Mount {
                    source: Some("/newroot".into()),
                    target: PathBuf::from("/newroot"),
                    fstype: None,
                    flags: MsFlags::MS_BIND | MsFlags::MS_REC,
                    data: None,
                },
                Op::Chdir(PathBuf::from("/newroot")),
                Op::Mkdir {
                    path: PathBuf::from("/newroot/pivot_root"),
                    mode: 0o700
                },
                Op::PivotRoot {
                    new_root: PathBuf::from("/newroot"),
                    put_old: PathBuf::from("/newroot/pivot_root"),
                },
                Op::Chdir(PathBuf::from("/")),
                Op::UmountDetach(PathBuf::from("/pivot_root")),
                Op::RemoveDir(PathBuf::from("/pivot_root")),
            ]
        );
        assert_eq!(switch.state(), RootSwitchState::WorkingDirectoryIsRoot);
    }
}
