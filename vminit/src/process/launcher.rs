//! Spawning the workload on the host kernel.

use super::{ResolvedProcess, WorkloadStdio};
use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use nix::pty::{Winsize, openpty};
use nix::sys::termios::Termios;
use std::fmt;
use std::io;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use vminit_shared::{InitError, InitResult};

/// How the workload ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkloadExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl WorkloadExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for WorkloadExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(signal)) => write!(f, "killed by signal {}", signal),
            (None, None) => write!(f, "unknown exit status"),
        }
    }
}

/// Creates the workload process.
pub trait Launcher {
    fn launch(
        &mut self,
        process: &ResolvedProcess,
        program: &Path,
        stdio: WorkloadStdio,
    ) -> InitResult<Box<dyn Workload>>;
}

/// A started workload.
pub trait Workload {
    fn pid(&self) -> u32;

    /// Connect the workload to the console. Returns once the workload's
    /// terminal hangs up, or immediately when there is nothing to relay.
    fn attach(&mut self) -> InitResult<()>;

    /// Reap the workload.
    fn wait(&mut self) -> InitResult<WorkloadExit>;
}

/// Spawns through [`std::process::Command`].
#[derive(Debug, Default)]
pub struct HostLauncher;

impl HostLauncher {
    pub fn new() -> Self {
        Self
    }
}

impl Launcher for HostLauncher {
    fn launch(
        &mut self,
        process: &ResolvedProcess,
        program: &Path,
        stdio: WorkloadStdio,
    ) -> InitResult<Box<dyn Workload>> {
        let mut cmd = Command::new(program);
        if let Some((arg0, args)) = process.argv.split_first() {
            cmd.arg0(arg0).args(args);
        }
        cmd.env_clear().envs(process.env_pairs());
        if let Some(dir) = &process.working_dir {
            cmd.current_dir(dir);
        }

        let master = match stdio {
            WorkloadStdio::Pty => {
                let pty = openpty(None::<&Winsize>, None::<&Termios>)
                    .map_err(|e| InitError::Workload(format!("failed to allocate pty: {}", e)))?;
                let slave = pty.slave;
                cmd.stdin(Stdio::from(clone_fd(&slave)?))
                    .stdout(Stdio::from(clone_fd(&slave)?))
                    .stderr(Stdio::from(slave));
                // SAFETY: setsid and ioctl are async-signal-safe.
                unsafe {
                    cmd.pre_exec(|| {
                        nix::unistd::setsid()?;
                        if libc::ioctl(0, libc::TIOCSCTTY as _, 0) < 0 {
                            return Err(io::Error::last_os_error());
                        }
                        Ok(())
                    });
                }
                Some(pty.master)
            }
            WorkloadStdio::Inherited(fds) => {
                let (stdin, stdout, stderr) = fds.into_stdio();
                cmd.stdin(stdin).stdout(stdout).stderr(stderr).process_group(0);
                None
            }
        };

        let child = cmd.spawn().map_err(|e| {
            InitError::Workload(format!("failed to spawn {}: {}", program.display(), e))
        })?;
        // The Command still holds the parent's copies of the child stdio;
        // drop them so a hangup is observed once the workload exits.
        drop(cmd);

        tracing::info!(pid = child.id(), program = %program.display(), "Workload started");
        Ok(Box::new(HostWorkload { child, master }))
    }
}

fn clone_fd(fd: &OwnedFd) -> InitResult<OwnedFd> {
    fd.try_clone()
        .map_err(|e| InitError::Workload(format!("failed to duplicate pty slave: {}", e)))
}

struct HostWorkload {
    child: Child,
    master: Option<OwnedFd>,
}

impl Workload for HostWorkload {
    fn pid(&self) -> u32 {
        self.child.id()
    }

    fn attach(&mut self) -> InitResult<()> {
        match self.master.take() {
            Some(master) => relay(&master)
                .map_err(|e| InitError::Workload(format!("pty relay failed: {}", e))),
            None => Ok(()),
        }
    }

    fn wait(&mut self) -> InitResult<WorkloadExit> {
        let status = self
            .child
            .wait()
            .map_err(|e| InitError::Workload(format!("failed to wait for workload: {}", e)))?;
        Ok(WorkloadExit {
            code: status.code(),
            signal: status.signal(),
        })
    }
}

/// Copy master output to our stdout and our stdin to the master until the
/// slave side is closed.
fn relay(master: &OwnedFd) -> nix::Result<()> {
    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut stdin_open = true;
    let mut buf = [0u8; 4096];

    loop {
        let (master_events, stdin_events) = {
            let mut fds = vec![PollFd::new(master.as_fd(), PollFlags::POLLIN)];
            if stdin_open {
                fds.push(PollFd::new(stdin.as_fd(), PollFlags::POLLIN));
            }
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) => {}
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
            let events = |fd: Option<&PollFd>| {
                fd.and_then(|f| f.revents()).unwrap_or(PollFlags::empty())
            };
            (events(fds.first()), events(fds.get(1)))
        };

        if !master_events.is_empty() {
            match nix::unistd::read(master, &mut buf) {
                // EIO: every slave descriptor is closed.
                Ok(0) | Err(Errno::EIO) => return Ok(()),
                Ok(n) => write_all(stdout.as_fd(), &buf[..n])?,
                Err(Errno::EINTR) | Err(Errno::EAGAIN) => {}
                Err(e) => return Err(e),
            }
        }

        if !stdin_events.is_empty() {
            match nix::unistd::read(stdin.as_fd(), &mut buf) {
                Ok(0) => stdin_open = false,
                Ok(n) => write_all(master.as_fd(), &buf[..n])?,
                Err(Errno::EINTR) | Err(Errno::EAGAIN) => {}
                Err(e) => {
                    tracing::debug!(error = %e, "Console input closed");
                    stdin_open = false;
                }
            }
        }
    }
}

fn write_all(fd: BorrowedFd<'_>, mut buf: &[u8]) -> nix::Result<()> {
    while !buf.is_empty() {
        match nix::unistd::write(fd, buf) {
            Ok(n) => buf = &buf[n..],
            Err(Errno::EINTR) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
