//! Boot sequencing.
//!
//! ## Architecture
//!
//! Boot is table-driven: one execution plan of sequential stages, followed by
//! the workload supervisor and a single reboot request.
//!
//! ```text
//! 1. filesystem   root_switch → kernel_filesystems → device_layout → cgroup_hierarchy
//! 2. resources    resource_limits
//! 3. identity     identity_resolve → additional_drives
//! 4. host         host_files → network
//! 5. workload     workload_stdio → privilege_drop → environment → process_build
//! ──────────────
//! supervise       start → attach → wait
//! reboot          exactly once, whatever happened above
//! ```
//!
//! Everything that needs root happens before `privilege_drop`.

mod context;
mod tasks;

pub use context::BootContext;

use crate::network::NetworkBackend;
use crate::pipeline::{BoxedTask, ExecutionPlan, PipelineBuilder, PipelineExecutor, Stage};
use crate::process::{Launcher, ResolvedProcess, Supervisor, WorkloadExit, WorkloadStdio};
use crate::world::World;
use tasks::{
    AdditionalDrivesTask, CgroupHierarchyTask, DeviceLayoutTask, EnvironmentTask, HostFilesTask,
    IdentityResolveTask, InitCtx, KernelFilesystemsTask, NetworkTask, PrivilegeDropTask,
    ProcessBuildTask, ResourceLimitsTask, RootSwitchTask, WorkloadStdioTask,
};
use vminit_shared::{InitError, InitResult, MachineConfig};

// ============================================================================
// EXECUTION PLAN
// ============================================================================

fn get_execution_plan<'a>() -> ExecutionPlan<InitCtx<'a>> {
    let stages: Vec<Stage<BoxedTask<InitCtx<'a>>>> = vec![
        // Root device first; everything below lives on it.
        Stage::new(
            "filesystem",
            vec![
                Box::new(RootSwitchTask),
                Box::new(KernelFilesystemsTask),
                Box::new(DeviceLayoutTask),
                Box::new(CgroupHierarchyTask),
            ],
        ),
        Stage::new("resources", vec![Box::new(ResourceLimitsTask)]),
        // Needs /etc/passwd from the new root.
        Stage::new(
            "identity",
            vec![Box::new(IdentityResolveTask), Box::new(AdditionalDrivesTask)],
        ),
        Stage::new("host", vec![Box::new(HostFilesTask), Box::new(NetworkTask)]),
        Stage::new(
            "workload",
            vec![
                Box::new(WorkloadStdioTask),
                Box::new(PrivilegeDropTask),
                Box::new(EnvironmentTask),
                Box::new(ProcessBuildTask),
            ],
        ),
    ];

    ExecutionPlan::new(stages)
}

/// What happened before the reboot.
#[derive(Debug)]
pub enum BootOutcome {
    /// The workload ran and was reaped.
    Exited(WorkloadExit),
    /// A boot task failed; the workload never started.
    BootFailed(InitError),
    /// The workload could not be started or waited on.
    WorkloadFailed(InitError),
}

#[derive(Debug)]
pub struct BootReport {
    pub outcome: BootOutcome,
    /// Result of the reboot request. On a live guest this is only ever an
    /// error, since a successful reboot does not return.
    pub reboot: InitResult<()>,
}

/// Runs the boot plan, supervises the workload and reboots.
pub struct BootSequencer<W, N, L> {
    world: W,
    network: N,
    launcher: L,
}

impl<W, N, L> BootSequencer<W, N, L>
where
    W: World,
    N: NetworkBackend,
    L: Launcher,
{
    pub fn new(world: W, network: N, launcher: L) -> Self {
        Self {
            world,
            network,
            launcher,
        }
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    /// Boot, supervise, then issue exactly one reboot request.
    pub fn run(&mut self, config: &MachineConfig) -> BootReport {
        let outcome = match self.boot(config) {
            Ok((process, stdio)) => {
                match Supervisor::new(process, &mut self.launcher).run(stdio) {
                    Ok(exit) => BootOutcome::Exited(exit),
                    Err(e) => BootOutcome::WorkloadFailed(e),
                }
            }
            Err(e) => BootOutcome::BootFailed(e),
        };

        match &outcome {
            BootOutcome::Exited(exit) => tracing::info!("Workload finished with {}", exit),
            BootOutcome::BootFailed(e) | BootOutcome::WorkloadFailed(e) => tracing::error!(
                error = %e,
                category = ?e.category(),
                fatal = e.is_fatal(),
                "Workload did not run to completion"
            ),
        }

        let reboot = request_reboot(&mut self.world);
        BootReport { outcome, reboot }
    }

    /// Run every boot task and return the workload ready to launch.
    pub fn boot(&mut self, config: &MachineConfig) -> InitResult<(ResolvedProcess, WorkloadStdio)> {
        let mut ctx = BootContext::new(&mut self.world, &mut self.network, config);
        let pipeline = PipelineBuilder::from_plan(get_execution_plan());
        let metrics = PipelineExecutor::execute(pipeline, &mut ctx)?;
        metrics.log_summary();
        ctx.into_workload()
    }
}

/// Sync filesystems and restart the guest.
pub fn request_reboot(world: &mut dyn World) -> InitResult<()> {
    tracing::info!("Rebooting guest");
    world
        .reboot()
        .map_err(|e| InitError::Internal(format!("reboot failed: {}", e)))
}
