//! Fixed paths, modes and limits of the guest boot sequence.
//!
//! Centralized so the mount tables, root switch and supervisor agree on them.

/// Paths in the initial root and in the guest root.
pub mod paths {
    /// Staging tree in the initial root; removed after the root switch.
    pub const STAGING_DIR: &str = "/thi";

    /// Machine configuration document, read before the root switch.
    pub const CONFIG_PATH: &str = "/thi/run.json";

    /// Scratch mount point for the guest root device.
    pub const NEW_ROOT: &str = "/newroot";

    /// Root device used when the configuration leaves it empty.
    pub const DEFAULT_ROOT_DEVICE: &str = "/dev/vdb";

    /// Old-root mount point used by the pivot strategy, relative to the new root.
    pub const PIVOT_OLD_ROOT: &str = "pivot_root";

    pub const ETC_DIR: &str = "/etc";
    pub const ETC_HOSTNAME: &str = "/etc/hostname";
    pub const ETC_HOSTS: &str = "/etc/hosts";
    pub const ETC_RESOLV: &str = "/etc/resolv.conf";
    pub const ETC_PASSWD: &str = "/etc/passwd";
    pub const ETC_GROUP: &str = "/etc/group";

    pub const CGROUP_ROOT: &str = "/sys/fs/cgroup";
}

/// Permission bits used for created directories and files.
pub mod modes {
    pub const DIR_0755: u32 = 0o755;
    pub const DIR_0555: u32 = 0o555;
    pub const DIR_0700: u32 = 0o700;
    /// World-writable with the sticky bit.
    pub const DIR_1777: u32 = 0o1777;
    pub const FILE_0644: u32 = 0o644;
}

/// Filesystem types.
pub mod fstype {
    /// Filesystem of the root device and of additional drives.
    pub const JOURNALING: &str = "ext4";
}

pub mod limits {
    /// RLIMIT_NOFILE soft and hard limit applied before the privilege drop.
    pub const NOFILE: u64 = 10240;
}

pub mod network {
    pub const LOOPBACK: &str = "lo";
    pub const PRIMARY: &str = "eth0";
}

pub mod process {
    /// Search path used when the workload environment has no `PATH`.
    pub const DEFAULT_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
}
