//! World implementation backed by real syscalls.

use super::{World, io_errno};
use crate::process::InheritedStdio;
use nix::mount::{MntFlags, MsFlags};
use nix::sys::reboot::{RebootMode, reboot};
use nix::sys::resource::{Resource, setrlimit};
use nix::sys::stat::Mode;
use nix::unistd::{Gid, Uid};
use std::fs::OpenOptions;
use std::io::Write;
use std::os::fd::BorrowedFd;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// The running guest. Only meaningful inside the VM as PID 1.
#[derive(Debug, Default)]
pub struct LiveWorld {
    _private: (),
}

impl LiveWorld {
    pub fn new() -> Self {
        Self::default()
    }
}

impl World for LiveWorld {
    fn mkdir(&mut self, path: &Path, mode: Mode) -> nix::Result<()> {
        nix::unistd::mkdir(path, mode)
    }

    fn mount(
        &mut self,
        source: Option<&str>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> nix::Result<()> {
        nix::mount::mount(source, target, fstype, flags, data)
    }

    fn umount_detach(&mut self, target: &Path) -> nix::Result<()> {
        nix::mount::umount2(target, MntFlags::MNT_DETACH)
    }

    fn pivot_root(&mut self, new_root: &Path, put_old: &Path) -> nix::Result<()> {
        nix::unistd::pivot_root(new_root, put_old)
    }

    fn chdir(&mut self, path: &Path) -> nix::Result<()> {
        nix::unistd::chdir(path)
    }

    fn chroot(&mut self, path: &Path) -> nix::Result<()> {
        nix::unistd::chroot(path)
    }

    fn remove_all(&mut self, path: &Path) -> nix::Result<()> {
        std::fs::remove_dir_all(path).map_err(io_errno)
    }

    fn remove_dir(&mut self, path: &Path) -> nix::Result<()> {
        std::fs::remove_dir(path).map_err(io_errno)
    }

    fn symlink(&mut self, original: &Path, link: &Path) -> nix::Result<()> {
        std::os::unix::fs::symlink(original, link).map_err(io_errno)
    }

    fn chmod(&mut self, path: &Path, mode: Mode) -> nix::Result<()> {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode.bits()))
            .map_err(io_errno)
    }

    fn chown(&mut self, path: &Path, uid: Uid, gid: Gid) -> nix::Result<()> {
        std::os::unix::fs::chown(path, Some(uid.as_raw()), Some(gid.as_raw())).map_err(io_errno)
    }

    fn fchown(&mut self, fd: BorrowedFd<'_>, uid: Uid, gid: Gid) -> nix::Result<()> {
        std::os::unix::fs::fchown(fd, Some(uid.as_raw()), Some(gid.as_raw())).map_err(io_errno)
    }

    fn set_nofile_limit(&mut self, limit: u64) -> nix::Result<()> {
        setrlimit(Resource::RLIMIT_NOFILE, limit, limit)
    }

    fn setgroups(&mut self, groups: &[Gid]) -> nix::Result<()> {
        nix::unistd::setgroups(groups)
    }

    fn setgid(&mut self, gid: Gid) -> nix::Result<()> {
        nix::unistd::setgid(gid)
    }

    fn setuid(&mut self, uid: Uid) -> nix::Result<()> {
        nix::unistd::setuid(uid)
    }

    fn sethostname(&mut self, name: &str) -> nix::Result<()> {
        nix::unistd::sethostname(name)
    }

    fn read_file(&self, path: &Path) -> nix::Result<Vec<u8>> {
        std::fs::read(path).map_err(io_errno)
    }

    fn write_file(&mut self, path: &Path, contents: &[u8], mode: Mode) -> nix::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(mode.bits())
            .open(path)
            .map_err(io_errno)?;
        file.write_all(contents).map_err(io_errno)
    }

    fn get_env(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn set_env(&mut self, key: &str, value: &str) -> nix::Result<()> {
        // SAFETY: the boot sequence runs on a single thread; the network
        // runtime is gone by the time the environment is written.
        unsafe { std::env::set_var(key, value) };
        Ok(())
    }

    fn open_console_stdio(&mut self) -> nix::Result<InheritedStdio> {
        InheritedStdio::open_console().map_err(io_errno)
    }

    fn reboot(&mut self) -> nix::Result<()> {
        nix::unistd::sync();
        match reboot(RebootMode::RB_AUTOBOOT) {
            Ok(never) => match never {},
            Err(e) => Err(e),
        }
    }
}
