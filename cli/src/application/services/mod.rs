//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod cluster;
pub mod dev_loop;
pub mod exec;
pub mod hooks;
pub mod instance_down;
pub mod instance_status;
pub mod instance_up;
pub mod lockfile;
pub mod port_allocator;
pub mod registry_advertise;
pub mod registry_port;
pub mod tools;
