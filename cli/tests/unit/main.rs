//! Unit tests for the silo CLI
//!
//! These tests use mocked dependencies and run fast without external I/O.

mod architecture;
mod hooks;
mod lockfile_store;
mod mocks;
mod port_allocator;
mod registry_port;
