//! Port allocation vocabulary: candidate ordering and allocation events.

use std::fmt;
use std::ops::RangeInclusive;

use crate::domain::config::PortSpec;

/// Last-resort pool scanned when preferred ports are taken.
pub const EPHEMERAL_RANGE: RangeInclusive<u16> = 49152..=65535;

/// Where an assigned port came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSource {
    Lockfile,
    Default,
    Ephemeral,
}

impl fmt::Display for PortSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Lockfile => "lockfile",
            Self::Default => "default",
            Self::Ephemeral => "ephemeral",
        })
    }
}

/// Per-key allocation record. Observability only, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortAllocationEvent {
    pub key: String,
    pub requested_default: PortSpec,
    pub requested_lock: Option<u16>,
    pub assigned: u16,
    pub source: PortSource,
}

/// Preferred ports for one key, most preferred first.
///
/// A recorded lockfile port comes first unless `force` suppresses reuse;
/// the declared default follows unless it is `random`. Port 0 never counts
/// as a recorded port.
#[must_use]
pub fn candidates(spec: PortSpec, recorded: Option<u16>, force: bool) -> Vec<(u16, PortSource)> {
    let mut out = Vec::with_capacity(2);
    if let Some(port) = recorded.filter(|p| !force && *p != 0) {
        out.push((port, PortSource::Lockfile));
    }
    if let Some(port) = spec.fixed() {
        out.push((port, PortSource::Default));
    }
    out
}
