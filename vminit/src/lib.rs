//! PID-1 init for VM guests.
//!
//! Switches from the initial in-memory root to the guest's root device,
//! mounts the kernel interface filesystems and control groups, prepares the
//! workload identity and environment, brings up networking, then runs and
//! supervises exactly one workload. When the workload exits, or anything
//! before it fails, the guest is rebooted.

pub mod boot;
pub mod cgroup;
pub mod constants;
pub mod env;
pub mod identity;
pub mod logging;
pub mod mount;
pub mod network;
pub mod pipeline;
pub mod privilege;
pub mod process;
pub mod root_switch;
pub mod world;

pub use boot::{BootOutcome, BootReport, BootSequencer, request_reboot};
pub use vminit_shared::{InitError, InitResult, MachineConfig};
