//! Application layer: port trait definitions and use-case orchestration.
//!
//! This module depends only on `crate::domain`, never on `crate::infra`,
//! `crate::commands`, or `crate::output`.

pub mod ports;
pub mod retry;
pub mod services;

#[allow(unused_imports)]
pub use ports::{
    CommandOutput, CommandRequest, CommandRunner, ConfigStore, InstanceHost, LocalFs, LocalPaths,
    LockfileStore, PortProbe, ProcessControl, ProgressReporter, StdioMode, StopSignal,
};
