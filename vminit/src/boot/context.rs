//! Shared state threaded through the boot tasks.

use crate::env::EnvVar;
use crate::identity::Identity;
use crate::network::NetworkBackend;
use crate::process::{ResolvedProcess, WorkloadStdio};
use crate::world::World;
use vminit_shared::{InitError, InitResult, MachineConfig};

/// Boot pipeline context.
///
/// Tasks fill the optional fields in order; a task that needs an earlier
/// task's output reads it through the accessors, which fail with an internal
/// error when the plan was assembled in the wrong order.
pub struct BootContext<'a> {
    pub world: &'a mut dyn World,
    pub network: &'a mut dyn NetworkBackend,
    pub config: &'a MachineConfig,
    pub identity: Option<Identity>,
    pub env: Option<Vec<EnvVar>>,
    pub stdio: Option<WorkloadStdio>,
    pub process: Option<ResolvedProcess>,
}

impl<'a> BootContext<'a> {
    pub fn new(
        world: &'a mut dyn World,
        network: &'a mut dyn NetworkBackend,
        config: &'a MachineConfig,
    ) -> Self {
        Self {
            world,
            network,
            config,
            identity: None,
            env: None,
            stdio: None,
            process: None,
        }
    }

    pub fn identity(&self) -> InitResult<&Identity> {
        self.identity
            .as_ref()
            .ok_or_else(|| missing("identity_resolve"))
    }

    /// Hand over the workload and its stdio once the pipeline is done.
    pub fn into_workload(self) -> InitResult<(ResolvedProcess, WorkloadStdio)> {
        let process = self.process.ok_or_else(|| missing("process_build"))?;
        let stdio = self.stdio.ok_or_else(|| missing("workload_stdio"))?;
        Ok((process, stdio))
    }
}

fn missing(task: &str) -> InitError {
    InitError::Internal(format!("{} task must run first", task))
}
