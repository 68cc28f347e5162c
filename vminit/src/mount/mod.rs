//! Declarative mount execution.
//!
//! A [`MountSpec`] describes one mount(2) call plus an optional idempotent
//! creation of its target directory. A [`MountPlan`] is an ordered list of
//! specs executed strictly in order; the first failure aborts the rest of the
//! plan. Nothing is rolled back: a failed boot is abandoned.

mod drives;
pub mod table;

pub use drives::mount_additional_drives;

use crate::world::{World, ensure_dir};
use nix::mount::MsFlags;
use nix::sys::stat::Mode;
use std::fmt;
use std::path::{Path, PathBuf};
use vminit_shared::{InitError, InitResult};

/// Flags shared by most kernel filesystems: no devices, no exec, no setuid.
pub const COMMON_MNT_FLAGS: MsFlags = MsFlags::MS_NODEV
    .union(MsFlags::MS_NOEXEC)
    .union(MsFlags::MS_NOSUID);

/// One mount operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub source: Option<String>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    pub flags: MsFlags,
    pub data: Option<String>,
    /// Create `target` with `target_mode` before mounting.
    pub create_target: bool,
    pub target_mode: Mode,
}

impl MountSpec {
    pub fn new(source: &str, target: impl Into<PathBuf>, fstype: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            target: target.into(),
            fstype: Some(fstype.to_string()),
            flags: MsFlags::empty(),
            data: None,
            create_target: false,
            target_mode: Mode::empty(),
        }
    }

    /// Relocate an existing mount from `source` to `target`.
    pub fn move_mount(source: &str, target: impl Into<PathBuf>) -> Self {
        Self {
            source: Some(source.to_string()),
            target: target.into(),
            fstype: None,
            flags: MsFlags::MS_MOVE,
            data: None,
            create_target: false,
            target_mode: Mode::empty(),
        }
    }

    pub fn flags(mut self, flags: MsFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn data(mut self, data: &str) -> Self {
        self.data = Some(data.to_string());
        self
    }

    /// Create the target directory with `mode` first; an existing directory is fine.
    pub fn create_target(mut self, mode: u32) -> Self {
        self.create_target = true;
        self.target_mode = Mode::from_bits_truncate(mode);
        self
    }

    /// Create the target if requested, then mount.
    pub fn apply(&self, world: &mut dyn World) -> InitResult<()> {
        tracing::debug!("{}", self);

        if self.create_target {
            let created = ensure_dir(world, &self.target, self.target_mode).map_err(|e| {
                InitError::Storage(format!(
                    "failed to create mount target {}: {}",
                    self.target.display(),
                    e
                ))
            })?;
            if !created {
                tracing::debug!(target = %self.target.display(), "Mount target already exists");
            }
        }

        world
            .mount(
                self.source.as_deref(),
                &self.target,
                self.fstype.as_deref(),
                self.flags,
                self.data.as_deref(),
            )
            .map_err(|e| {
                InitError::Mount(format!(
                    "failed to mount {} ({}): {}",
                    self.target.display(),
                    self,
                    e
                ))
            })
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mount ")?;
        match self.source.as_deref() {
            Some(source) if !source.is_empty() => {
                write!(f, "{}:{}", source, self.target.display())?
            }
            _ => write!(f, "{}", self.target.display())?,
        }
        if !self.flags.is_empty() {
            write!(f, ", flags: 0x{:x}", self.flags.bits())?;
        }
        if let Some(data) = self.data.as_deref().filter(|d| !d.is_empty()) {
            write!(f, ", data: {}", data)?;
        }
        Ok(())
    }
}

/// Ordered list of mounts executed as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountPlan {
    name: &'static str,
    specs: Vec<MountSpec>,
}

impl MountPlan {
    pub fn new(name: &'static str, specs: Vec<MountSpec>) -> Self {
        Self { name, specs }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn specs(&self) -> &[MountSpec] {
        &self.specs
    }

    pub fn targets(&self) -> Vec<&Path> {
        self.specs.iter().map(|s| s.target.as_path()).collect()
    }

    /// Execute every spec in order, stopping at the first failure.
    pub fn execute(&self, world: &mut dyn World) -> InitResult<()> {
        tracing::info!(plan = self.name, mounts = self.specs.len(), "Executing mount plan");
        for spec in &self.specs {
            spec.apply(world)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Op, RecordingWorld};
    use nix::errno::Errno;

    fn sample_plan() -> MountPlan {
        MountPlan::new(
            "sample",
            vec![
                MountSpec::new("devpts", "/dev/pts", "devpts").create_target(0o755),
                MountSpec::new("mqueue", "/dev/mqueue", "mqueue").create_target(0o755),
                MountSpec::new("proc", "/proc", "proc")
                    .flags(COMMON_MNT_FLAGS)
                    .create_target(0o555),
                MountSpec::new("binfmt_misc", "/proc/sys/fs/binfmt_misc", "binfmt_misc"),
            ],
        )
    }

    #[test]
    fn test_mounts_issued_in_plan_order() {
        let mut world = RecordingWorld::new();
        sample_plan().execute(&mut world).unwrap();

        assert_eq!(
            world.mount_targets(),
            vec![
                PathBuf::from("/dev/pts"),
                PathBuf::from("/dev/mqueue"),
                PathBuf::from("/proc"),
                PathBuf::from("/proc/sys/fs/binfmt_misc"),
            ]
        );
    }

    #[test]
    fn test_target_created_before_its_mount() {
        let mut world = RecordingWorld::new();
        sample_plan().execute(&mut world).unwrap();

        let mkdir = world
            .position(|op| matches!(op, Op::Mkdir { path, .. } if path == Path::new("/proc")))
            .unwrap();
        let mount = world
            .position(|op| op.mount_target() == Some(Path::new("/proc")))
            .unwrap();
        assert!(mkdir < mount);
        assert_eq!(
            world.ops()[mkdir],
            Op::Mkdir {
                path: PathBuf::from("/proc"),
                mode: 0o555
            }
        );
    }

    #[test]
    fn test_existing_target_is_not_an_error() {
        let mut world = RecordingWorld::new().with_dir("/dev/pts").with_dir("/proc");
        sample_plan().execute(&mut world).unwrap();
        assert_eq!(world.mount_targets().len(), 4);
    }

    #[test]
    fn test_no_mkdir_without_create_target() {
        let mut world = RecordingWorld::new();
        sample_plan().execute(&mut world).unwrap();
        assert_eq!(
            world.position(
                |op| matches!(op, Op::Mkdir { path, .. } if path.ends_with("binfmt_misc"))
            ),
            None
        );
    }

    #[test]
    fn test_creation_failure_aborts_plan() {
        for errno in [Errno::EACCES, Errno::EROFS, Errno::ENOSPC, Errno::ENOENT] {
            let mut world = RecordingWorld::new().fail_when(
                |op| matches!(op, Op::Mkdir { path, .. } if path == Path::new("/dev/mqueue")),
                errno,
            );
            let err = sample_plan().execute(&mut world).unwrap_err();

            assert!(matches!(err, InitError::Storage(_)));
            assert!(err.to_string().contains("/dev/mqueue"));
            // Only the mount before the failing entry was attempted.
            assert_eq!(world.mount_targets(), vec![PathBuf::from("/dev/pts")]);
        }
    }

    #[test]
    fn test_mount_failure_names_target_and_stops() {
        let mut world = RecordingWorld::new().fail_when(
            |op| op.mount_target() == Some(Path::new("/proc")),
            Errno::EBUSY,
        );
        let err = sample_plan().execute(&mut world).unwrap_err();

        assert!(matches!(err, InitError::Mount(_)));
        assert!(err.to_string().contains("failed to mount /proc"));
        assert_eq!(world.mount_targets().last(), Some(&PathBuf::from("/proc")));
        assert_eq!(world.mount_targets().len(), 3);
    }

    #[test]
    fn test_display_matches_log_format() {
        let spec = MountSpec::new("hugetlbfs", "/dev/hugepages", "hugetlbfs")
            .flags(MsFlags::MS_RELATIME)
            .data("pagesize=2M");
        assert_eq!(
            spec.to_string(),
            format!(
                "mount hugetlbfs:/dev/hugepages, flags: 0x{:x}, data: pagesize=2M",
                MsFlags::MS_RELATIME.bits()
            )
        );

        let spec = MountSpec::move_mount("", "/");
        assert_eq!(
            spec.to_string(),
            format!("mount /, flags: 0x{:x}", MsFlags::MS_MOVE.bits())
        );
    }
}
