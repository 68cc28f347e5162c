//! Fixed kernel-filesystem mounts issued after the root switch.

use super::{COMMON_MNT_FLAGS, MountPlan, MountSpec};
use crate::constants::modes;
use nix::mount::MsFlags;

/// Interface filesystems under `/dev`, `/proc`, `/sys` and `/run`.
///
/// `/proc` precedes binfmt_misc, which lives underneath it and has no
/// target creation of its own.
pub fn kernel_filesystems() -> MountPlan {
    MountPlan::new(
        "kernel_filesystems",
        vec![
            MountSpec::new("devpts", "/dev/pts", "devpts")
                .flags(MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID | MsFlags::MS_NOATIME)
                .data("mode=0620,gid=5,ptmxmode=666")
                .create_target(modes::DIR_0755),
            MountSpec::new("mqueue", "/dev/mqueue", "mqueue")
                .flags(COMMON_MNT_FLAGS)
                .create_target(modes::DIR_0755),
            MountSpec::new("shm", "/dev/shm", "tmpfs")
                .flags(COMMON_MNT_FLAGS)
                .create_target(modes::DIR_1777),
            MountSpec::new("hugetlbfs", "/dev/hugepages", "hugetlbfs")
                .flags(MsFlags::MS_RELATIME)
                .data("pagesize=2M")
                .create_target(modes::DIR_0755),
            MountSpec::new("proc", "/proc", "proc")
                .flags(COMMON_MNT_FLAGS)
                .create_target(modes::DIR_0555),
            MountSpec::new("binfmt_misc", "/proc/sys/fs/binfmt_misc", "binfmt_misc")
                .flags(COMMON_MNT_FLAGS | MsFlags::MS_RELATIME),
            MountSpec::new("sys", "/sys", "sysfs")
                .flags(COMMON_MNT_FLAGS)
                .create_target(modes::DIR_0555),
            MountSpec::new("run", "/run", "tmpfs")
                .flags(MsFlags::MS_NOSUID | MsFlags::MS_NODEV)
                .data("mode=0755")
                .create_target(modes::DIR_0755),
        ],
    )
}
