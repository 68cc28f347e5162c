//! Boot tasks, one per step of the boot plan.

mod additional_drives;
mod cgroup_hierarchy;
mod device_layout;
mod environment;
mod host_files;
mod identity_resolve;
mod kernel_filesystems;
mod network;
mod privilege_drop;
mod process_build;
mod resource_limits;
mod root_switch;
mod workload_stdio;

pub use additional_drives::AdditionalDrivesTask;
pub use cgroup_hierarchy::CgroupHierarchyTask;
pub use device_layout::DeviceLayoutTask;
pub use environment::EnvironmentTask;
pub use host_files::HostFilesTask;
pub use identity_resolve::IdentityResolveTask;
pub use kernel_filesystems::KernelFilesystemsTask;
pub use network::NetworkTask;
pub use privilege_drop::PrivilegeDropTask;
pub use process_build::ProcessBuildTask;
pub use resource_limits::ResourceLimitsTask;
pub use root_switch::RootSwitchTask;
pub use workload_stdio::WorkloadStdioTask;

use super::BootContext;
use vminit_shared::InitError;

pub type InitCtx<'a> = BootContext<'a>;

fn task_start(task_name: &str) {
    tracing::debug!(task = task_name, "Starting boot task");
}

fn log_task_error(task_name: &str, err: &InitError) {
    tracing::error!(task = task_name, error = %err, "Boot task failed");
}
