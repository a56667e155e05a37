//! Domain layer: pure instance logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod cluster;
pub mod config;
pub mod env;
pub mod error;
pub mod identity;
pub mod instance;
pub mod name;
pub mod ports;
pub mod profile;
pub mod registry;
pub mod template;

#[allow(unused_imports)]
pub use config::{HookPhase, PortSpec, ResolvedConfig};
#[allow(unused_imports)]
pub use error::{
    CommandError, ConfigError, ErrorCode, InstanceError, LockfileError, PortError, ProfileError,
    RegistryError, TemplateError, error_code,
};
