//! Workload stdio.
//!
//! Two modes are supported:
//!
//! - **Pty**: the launcher allocates a pseudo-terminal pair, the workload
//!   gets the slave side as its controlling terminal, and init relays the
//!   master side to and from its own console.
//! - **Inherited**: the console descriptors init was started with are
//!   reopened and handed to the workload directly. They are opened (and
//!   chowned to the workload identity) while init still runs as root.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::path::Path;
use std::process::Stdio;

/// Console descriptors handed to a workload in inheritance mode.
///
/// Owned values: dropping this closes all three descriptors.
#[derive(Debug)]
pub struct InheritedStdio {
    stdin: OwnedFd,
    stdout: OwnedFd,
    stderr: OwnedFd,
}

impl InheritedStdio {
    /// Reopen init's own fd 0, 1 and 2 through procfs.
    ///
    /// Reopening yields fresh descriptors whose ownership can be changed
    /// without touching the ones init keeps logging to.
    pub fn open_console() -> io::Result<Self> {
        Ok(Self {
            stdin: open_rw("/proc/self/fd/0")?,
            stdout: open_rw("/proc/self/fd/1")?,
            stderr: open_rw("/proc/self/fd/2")?,
        })
    }

    /// `/dev/null` on all three streams.
    pub fn open_null() -> io::Result<Self> {
        Ok(Self {
            stdin: open_rw("/dev/null")?,
            stdout: open_rw("/dev/null")?,
            stderr: open_rw("/dev/null")?,
        })
    }

    pub fn fds(&self) -> [BorrowedFd<'_>; 3] {
        [self.stdin.as_fd(), self.stdout.as_fd(), self.stderr.as_fd()]
    }

    /// Convert into `(stdin, stdout, stderr)` for [`std::process::Command`].
    pub fn into_stdio(self) -> (Stdio, Stdio, Stdio) {
        (
            Stdio::from(self.stdin),
            Stdio::from(self.stdout),
            Stdio::from(self.stderr),
        )
    }
}

fn open_rw(path: impl AsRef<Path>) -> io::Result<OwnedFd> {
    let file = OpenOptions::new().read(true).write(true).open(path)?;
    Ok(OwnedFd::from(file))
}

/// How the workload's stdio is wired.
#[derive(Debug)]
pub enum WorkloadStdio {
    /// Allocate a pseudo-terminal at launch.
    Pty,
    Inherited(InheritedStdio),
}

impl WorkloadStdio {
    pub fn is_pty(&self) -> bool {
        matches!(self, Self::Pty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;

    #[test]
    fn test_null_stdio_fds_are_distinct() {
        let stdio = InheritedStdio::open_null().unwrap();
        let fds = stdio.fds().map(|fd| fd.as_raw_fd());

        assert!(fds.iter().all(|fd| *fd > 2));
        assert_ne!(fds[0], fds[1]);
        assert_ne!(fds[1], fds[2]);
        assert_ne!(fds[0], fds[2]);
    }

    #[test]
    fn test_into_stdio_consumes_descriptors() {
        let stdio = InheritedStdio::open_null().unwrap();
        let (stdin, stdout, stderr) = stdio.into_stdio();
        let status = std::process::Command::new("/bin/sh")
            .args(["-c", "echo discarded; cat"])
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_mode_predicate() {
        assert!(WorkloadStdio::Pty.is_pty());
        let inherited = WorkloadStdio::Inherited(InheritedStdio::open_null().unwrap());
        assert!(!inherited.is_pty());
    }
}
