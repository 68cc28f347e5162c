//! Types shared between the vminit boot sequencer and the host-side tooling
//! that produces its machine configuration.

pub mod config;
pub mod errors;

pub use config::{
    EtcHost, EtcResolv, ImageConfig, MachineConfig, MountRequest, RootSwitchMode, decode_machine,
};
pub use errors::{ErrorCategory, InitError, InitResult};
