//! In-memory world that records every operation the boot sequence attempts.

use super::World;
use crate::process::InheritedStdio;
use nix::errno::Errno;
use nix::mount::MsFlags;
use nix::sys::stat::Mode;
use nix::unistd::{Gid, Uid};
use std::collections::{BTreeMap, BTreeSet};
use std::os::fd::BorrowedFd;
use std::path::{Path, PathBuf};

/// One attempted operation, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Mkdir {
        path: PathBuf,
        mode: u32,
    },
    Mount {
        source: Option<String>,
        target: PathBuf,
        fstype: Option<String>,
        flags: MsFlags,
        data: Option<String>,
    },
    UmountDetach(PathBuf),
    PivotRoot {
        new_root: PathBuf,
        put_old: PathBuf,
    },
    Chdir(PathBuf),
    Chroot(PathBuf),
    RemoveAll(PathBuf),
    RemoveDir(PathBuf),
    Symlink {
        original: PathBuf,
        link: PathBuf,
    },
    Chmod {
        path: PathBuf,
        mode: u32,
    },
    Chown {
        path: PathBuf,
        uid: u32,
        gid: u32,
    },
    Fchown {
        uid: u32,
        gid: u32,
    },
    SetNofileLimit(u64),
    Setgroups(Vec<u32>),
    Setgid(u32),
    Setuid(u32),
    Sethostname(String),
    WriteFile {
        path: PathBuf,
        contents: Vec<u8>,
        mode: u32,
    },
    SetEnv {
        key: String,
        value: String,
    },
    OpenConsoleStdio,
    Reboot,
}

impl Op {
    /// Target path of a mount operation.
    pub fn mount_target(&self) -> Option<&Path> {
        match self {
            Op::Mount { target, .. } => Some(target),
            _ => None,
        }
    }
}

/// A mount the fake kernel currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountRecord {
    pub source: Option<String>,
    pub target: PathBuf,
    pub fstype: Option<String>,
    pub flags: MsFlags,
}

type FaultMatcher = Box<dyn Fn(&Op) -> bool>;

/// Fake guest used by tests.
///
/// Directories, files, mounts, ownership, environment and credentials are
/// modelled just closely enough to observe what a boot stage did. Faults are
/// injected with [`RecordingWorld::fail_when`]; the matching operation is
/// still logged as attempted.
#[derive(Default)]
pub struct RecordingWorld {
    ops: Vec<Op>,
    faults: Vec<(FaultMatcher, Errno)>,
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
    mounts: Vec<MountRecord>,
    owners: BTreeMap<PathBuf, (u32, u32)>,
    modes: BTreeMap<PathBuf, u32>,
    env: BTreeMap<String, String>,
    hostname: Option<String>,
    credentials: Option<(u32, u32)>,
}

impl RecordingWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a directory.
    pub fn with_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.dirs.insert(path.into());
        self
    }

    /// Pre-populate a file.
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.files.insert(path.into(), contents.into());
        self
    }

    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Fail every operation matching `matcher` with `errno`.
    pub fn fail_when(mut self, matcher: impl Fn(&Op) -> bool + 'static, errno: Errno) -> Self {
        self.faults.push((Box::new(matcher), errno));
        self
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    /// Targets of every attempted mount, in order.
    pub fn mount_targets(&self) -> Vec<PathBuf> {
        self.ops
            .iter()
            .filter_map(Op::mount_target)
            .map(Path::to_path_buf)
            .collect()
    }

    pub fn count(&self, pred: impl Fn(&Op) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(op)).count()
    }

    /// Index of the first operation matching `pred`.
    pub fn position(&self, pred: impl Fn(&Op) -> bool) -> Option<usize> {
        self.ops.iter().position(pred)
    }

    pub fn dir_exists(&self, path: impl AsRef<Path>) -> bool {
        self.dirs.contains(path.as_ref())
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<&[u8]> {
        self.files.get(path.as_ref()).map(Vec::as_slice)
    }

    /// The most recent mount at `target`.
    pub fn mount_at(&self, target: impl AsRef<Path>) -> Option<&MountRecord> {
        self.mounts
            .iter()
            .rev()
            .find(|m| m.target == target.as_ref())
    }

    pub fn owner(&self, path: impl AsRef<Path>) -> Option<(u32, u32)> {
        self.owners.get(path.as_ref()).copied()
    }

    /// Mode set by the last successful `chmod`.
    pub fn mode(&self, path: impl AsRef<Path>) -> Option<u32> {
        self.modes.get(path.as_ref()).copied()
    }

    pub fn env(&self, key: &str) -> Option<&str> {
        self.env.get(key).map(String::as_str)
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    /// `(uid, gid)` after the last successful credential change.
    pub fn credentials(&self) -> Option<(u32, u32)> {
        self.credentials
    }

    fn record(&mut self, op: Op) -> nix::Result<()> {
        let fault = self
            .faults
            .iter()
            .find(|(matcher, _)| matcher(&op))
            .map(|(_, errno)| *errno);
        self.ops.push(op);
        match fault {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }
}

impl World for RecordingWorld {
    fn mkdir(&mut self, path: &Path, mode: Mode) -> nix::Result<()> {
        self.record(Op::Mkdir {
            path: path.to_path_buf(),
            mode: mode.bits(),
        })?;
        if !self.dirs.insert(path.to_path_buf()) {
            return Err(Errno::EEXIST);
        }
        Ok(())
    }

    fn mount(
        &mut self,
        source: Option<&str>,
        target: &Path,
        fstype: Option<&str>,
        flags: MsFlags,
        data: Option<&str>,
    ) -> nix::Result<()> {
        self.record(Op::Mount {
            source: source.map(str::to_string),
            target: target.to_path_buf(),
            fstype: fstype.map(str::to_string),
            flags,
            data: data.map(str::to_string),
        })?;
        self.mounts.push(MountRecord {
            source: source.map(str::to_string),
            target: target.to_path_buf(),
            fstype: fstype.map(str::to_string),
            flags,
        });
        Ok(())
    }

    fn umount_detach(&mut self, target: &Path) -> nix::Result<()> {
        self.record(Op::UmountDetach(target.to_path_buf()))?;
        self.mounts.retain(|m| m.target != target);
        Ok(())
    }

    fn pivot_root(&mut self, new_root: &Path, put_old: &Path) -> nix::Result<()> {
        self.record(Op::PivotRoot {
            new_root: new_root.to_path_buf(),
            put_old: put_old.to_path_buf(),
        })
    }

    fn chdir(&mut self, path: &Path) -> nix::Result<()> {
        self.record(Op::Chdir(path.to_path_buf()))
    }

    fn chroot(&mut self, path: &Path) -> nix::Result<()> {
        self.record(Op::Chroot(path.to_path_buf()))
    }

    fn remove_all(&mut self, path: &Path) -> nix::Result<()> {
        self.record(Op::RemoveAll(path.to_path_buf()))?;
        self.dirs.retain(|d| !d.starts_with(path));
        self.files.retain(|f, _| !f.starts_with(path));
        Ok(())
    }

    fn remove_dir(&mut self, path: &Path) -> nix::Result<()> {
        self.record(Op::RemoveDir(path.to_path_buf()))?;
        self.dirs.remove(path);
        Ok(())
    }

    fn symlink(&mut self, original: &Path, link: &Path) -> nix::Result<()> {
        self.record(Op::Symlink {
            original: original.to_path_buf(),
            link: link.to_path_buf(),
        })
    }

    fn chmod(&mut self, path: &Path, mode: Mode) -> nix::Result<()> {
        self.record(Op::Chmod {
            path: path.to_path_buf(),
            mode: mode.bits(),
        })?;
        if !self.dirs.contains(path) && !self.files.contains_key(path) {
            return Err(Errno::ENOENT);
        }
        self.modes.insert(path.to_path_buf(), mode.bits());
        Ok(())
    }

    fn chown(&mut self, path: &Path, uid: Uid, gid: Gid) -> nix::Result<()> {
        self.record(Op::Chown {
            path: path.to_path_buf(),
            uid: uid.as_raw(),
            gid: gid.as_raw(),
        })?;
        self.owners
            .insert(path.to_path_buf(), (uid.as_raw(), gid.as_raw()));
        Ok(())
    }

    fn fchown(&mut self, _fd: BorrowedFd<'_>, uid: Uid, gid: Gid) -> nix::Result<()> {
        self.record(Op::Fchown {
            uid: uid.as_raw(),
            gid: gid.as_raw(),
        })
    }

    fn set_nofile_limit(&mut self, limit: u64) -> nix::Result<()> {
        self.record(Op::SetNofileLimit(limit))
    }

    fn setgroups(&mut self, groups: &[Gid]) -> nix::Result<()> {
        self.record(Op::Setgroups(groups.iter().map(|g| g.as_raw()).collect()))
    }

    fn setgid(&mut self, gid: Gid) -> nix::Result<()> {
        self.record(Op::Setgid(gid.as_raw()))?;
        let uid = self.credentials.map(|(uid, _)| uid).unwrap_or(0);
        self.credentials = Some((uid, gid.as_raw()));
        Ok(())
    }

    fn setuid(&mut self, uid: Uid) -> nix::Result<()> {
        self.record(Op::Setuid(uid.as_raw()))?;
        let gid = self.credentials.map(|(_, gid)| gid).unwrap_or(0);
        self.credentials = Some((uid.as_raw(), gid));
        Ok(())
    }

    fn sethostname(&mut self, name: &str) -> nix::Result<()> {
        self.record(Op::Sethostname(name.to_string()))?;
        self.hostname = Some(name.to_string());
        Ok(())
    }

    fn read_file(&self, path: &Path) -> nix::Result<Vec<u8>> {
        self.files.get(path).cloned().ok_or(Errno::ENOENT)
    }

    fn write_file(&mut self, path: &Path, contents: &[u8], mode: Mode) -> nix::Result<()> {
        self.record(Op::WriteFile {
            path: path.to_path_buf(),
            contents: contents.to_vec(),
            mode: mode.bits(),
        })?;
        self.files.insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn get_env(&self, key: &str) -> Option<String> {
        self.env.get(key).cloned()
    }

    fn set_env(&mut self, key: &str, value: &str) -> nix::Result<()> {
        self.record(Op::SetEnv {
            key: key.to_string(),
            value: value.to_string(),
        })?;
        self.env.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn open_console_stdio(&mut self) -> nix::Result<InheritedStdio> {
        self.record(Op::OpenConsoleStdio)?;
        InheritedStdio::open_null().map_err(super::io_errno)
    }

    fn reboot(&mut self) -> nix::Result<()> {
        self.record(Op::Reboot)
    }
}
