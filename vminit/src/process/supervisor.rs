//! Lifecycle of the single supervised workload.

use super::{Launcher, ResolvedProcess, Workload, WorkloadExit, WorkloadStdio, resolve_program};
use vminit_shared::{InitError, InitResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Constructed,
    Started,
    Attached,
    Exited,
}

/// Owns the workload from spawn to reap.
///
/// Transitions are strictly `Constructed -> Started -> Attached -> Exited`;
/// calling a step out of order is an internal error.
pub struct Supervisor<'a> {
    process: ResolvedProcess,
    launcher: &'a mut dyn Launcher,
    workload: Option<Box<dyn Workload>>,
    state: SupervisorState,
}

impl<'a> Supervisor<'a> {
    pub fn new(process: ResolvedProcess, launcher: &'a mut dyn Launcher) -> Self {
        Self {
            process,
            launcher,
            workload: None,
            state: SupervisorState::Constructed,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn start(&mut self, stdio: WorkloadStdio) -> InitResult<()> {
        self.require_state(SupervisorState::Constructed)?;
        let program = resolve_program(&self.process)?;
        tracing::info!(
            program = %program.display(),
            argv = ?self.process.argv,
            pty = stdio.is_pty(),
            "Starting workload"
        );
        self.workload = Some(self.launcher.launch(&self.process, &program, stdio)?);
        self.state = SupervisorState::Started;
        Ok(())
    }

    pub fn attach(&mut self) -> InitResult<()> {
        self.require_state(SupervisorState::Started)?;
        let result = self.workload_mut()?.attach();
        // Reaping must still happen when the relay breaks.
        self.state = SupervisorState::Attached;
        result
    }

    pub fn wait(&mut self) -> InitResult<WorkloadExit> {
        self.require_state(SupervisorState::Attached)?;
        let workload = self.workload_mut()?;
        let pid = workload.pid();
        let exit = workload.wait()?;
        self.state = SupervisorState::Exited;
        tracing::info!(pid, code = ?exit.code, signal = ?exit.signal, "Workload exited: {}", exit);
        Ok(exit)
    }

    /// Start, attach and wait.
    pub fn run(mut self, stdio: WorkloadStdio) -> InitResult<WorkloadExit> {
        self.start(stdio)?;
        if let Err(e) = self.attach() {
            tracing::warn!(error = %e, "Console relay ended early");
        }
        self.wait()
    }

    fn workload_mut(&mut self) -> InitResult<&mut Box<dyn Workload>> {
        self.workload
            .as_mut()
            .ok_or_else(|| InitError::Internal("workload not started".to_string()))
    }

    fn require_state(&self, state: SupervisorState) -> InitResult<()> {
        if self.state != state {
            return Err(InitError::Internal(format!(
                "supervisor is {:?}, expected {:?}",
                self.state, state
            )));
        }
        Ok(())
    }
}
