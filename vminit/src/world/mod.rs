//! Kernel and filesystem state seen by the boot sequence.
//!
//! Every mutation the sequencer performs on the guest (mount table, process
//! credentials, environment block, files under the new root) goes through
//! [`World`]. [`LiveWorld`] issues the real syscalls; [`RecordingWorld`]
//! keeps an in-memory model and an ordered log of every attempted operation
//! so that stage ordering and failure paths can be tested without privileges.

mod live;
mod recording;

pub use live::LiveWorld;
pub use recording::{MountRecord, Op, RecordingWorld};

use crate::process::InheritedStdio;
use nix::errno::Errno;
use nix::mount::MsFlags;
use nix::sys::stat::Mode;
use nix::unistd::{Gid, Uid};
use std::os::fd::BorrowedFd;
use std::path::Path;

/// Operations the boot sequence performs on live kernel state.
///
/// Errors are reported as raw [`Errno`] values so callers can tell
/// "already exists" apart from real failures.
pub trait World {
    /// Create a single directory (no parents).
    fn mkdir(&mut self, path: &Path, mode: Mode) -> nix::Result<()>;

    fn mount(
        &mut self,
        source: Option<&str>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> nix::Result<()>;

    /// Lazily detach the mount at `target`.
    fn umount_detach(&mut self, target: &Path) -> nix::Result<()>;

    fn pivot_root(&mut self, new_root: &Path, put_old: &Path) -> nix::Result<()>;

    fn chdir(&mut self, path: &Path) -> nix::Result<()>;

    fn chroot(&mut self, path: &Path) -> nix::Result<()>;

    /// Recursively remove a directory tree.
    fn remove_all(&mut self, path: &Path) -> nix::Result<()>;

    fn remove_dir(&mut self, path: &Path) -> nix::Result<()>;

    fn symlink(&mut self, original: &Path, link: &Path) -> nix::Result<()>;

    /// Set permission bits exactly, unaffected by the umask.
    fn chmod(&mut self, path: &Path, mode: Mode) -> nix::Result<()>;

    fn chown(&mut self, path: &Path, uid: Uid, gid: Gid) -> nix::Result<()>;

    fn fchown(&mut self, fd: BorrowedFd<'_>, uid: Uid, gid: Gid) -> nix::Result<()>;

    /// Set RLIMIT_NOFILE soft and hard limits.
    fn set_nofile_limit(&mut self, limit: u64) -> nix::Result<()>;

    fn setgroups(&mut self, groups: &[Gid]) -> nix::Result<()>;

    fn setgid(&mut self, gid: Gid) -> nix::Result<()>;

    fn setuid(&mut self, uid: Uid) -> nix::Result<()>;

    fn sethostname(&mut self, name: &str) -> nix::Result<()>;

    fn read_file(&self, path: &Path) -> nix::Result<Vec<u8>>;

    fn write_file(&mut self, path: &Path, contents: &[u8], mode: Mode) -> nix::Result<()>;

    fn get_env(&self, key: &str) -> Option<String>;

    fn set_env(&mut self, key: &str, value: &str) -> nix::Result<()>;

    /// Open the descriptors of the process's own console stdio.
    fn open_console_stdio(&mut self) -> nix::Result<InheritedStdio>;

    /// Flush filesystems and restart the guest. Only returns on failure.
    fn reboot(&mut self) -> nix::Result<()>;
}

/// Convert an I/O error into the errno the kernel reported.
pub(crate) fn io_errno(err: std::io::Error) -> Errno {
    err.raw_os_error().map(Errno::from_raw).unwrap_or(Errno::EIO)
}

/// `mkdir` that treats an existing directory as success.
///
/// Returns `Ok(true)` when the directory was created and `Ok(false)` when it
/// was already present.
pub fn ensure_dir(world: &mut dyn World, path: &Path, mode: Mode) -> nix::Result<bool> {
    match world.mkdir(path, mode) {
        Ok(()) => Ok(true),
        Err(Errno::EEXIST) => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_errno_keeps_os_code() {
        let err = std::io::Error::from_raw_os_error(libc::EACCES);
        assert_eq!(io_errno(err), Errno::EACCES);

        let err = std::io::Error::other("synthetic");
        assert_eq!(io_errno(err), Errno::EIO);
    }

    #[test]
    fn test_ensure_dir_tolerates_existing() {
        let mut world = RecordingWorld::new().with_dir("/dev");
        assert_eq!(
            ensure_dir(&mut world, Path::new("/dev"), Mode::from_bits_truncate(0o755)),
            Ok(false)
        );
        assert_eq!(
            ensure_dir(&mut world, Path::new("/run"), Mode::from_bits_truncate(0o755)),
            Ok(true)
        );
    }

    #[test]
    fn test_ensure_dir_propagates_other_errors() {
        let mut world = RecordingWorld::new()
            .fail_when(|op| matches!(op, Op::Mkdir { .. }), Errno::EROFS);
        assert_eq!(
            ensure_dir(&mut world, Path::new("/run"), Mode::from_bits_truncate(0o755)),
            Err(Errno::EROFS)
        );
    }
}
