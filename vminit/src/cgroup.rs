//! Control-group filesystem layout.

use crate::constants::{modes, paths};
use crate::mount::{COMMON_MNT_FLAGS, MountPlan, MountSpec};
use nix::mount::MsFlags;
use std::path::Path;

/// v1 controllers mounted after the unified hierarchy, in mount order.
pub const V1_CONTROLLERS: &[&str] = &[
    "net_cls",
    "net_prio",
    "hugetlb",
    "pids",
    "freezer",
    "cpu",
    "cpuacct",
    "devices",
    "blkio",
    "memory",
    "perf_event",
    "cpuset",
];

/// tmpfs at `/sys/fs/cgroup`, the unified v2 hierarchy, then one hierarchy
/// per v1 controller.
pub fn cgroup_hierarchy() -> MountPlan {
    let root = Path::new(paths::CGROUP_ROOT);
    let controller_flags = COMMON_MNT_FLAGS | MsFlags::MS_RELATIME;

    let mut specs = vec![
        MountSpec::new("tmpfs", root, "tmpfs")
            .flags(COMMON_MNT_FLAGS)
            .data("mode=0755"),
        MountSpec::new("cgroup2", root.join("unified"), "cgroup2")
            .flags(controller_flags)
            .data("nsdelegate")
            .create_target(modes::DIR_0555),
    ];
    specs.extend(V1_CONTROLLERS.iter().map(|controller| {
        MountSpec::new("cgroup", root.join(controller), "cgroup")
            .flags(controller_flags)
            .data(controller)
            .create_target(modes::DIR_0555)
    }));

    MountPlan::new("cgroup_hierarchy", specs)
}
