//! Shared types for silo: the persisted instance record and its building blocks.

#![cfg_attr(test, allow(clippy::expect_used))]

pub mod ordered;
pub mod types;

pub use ordered::OrderedMap;
pub use types::*;
