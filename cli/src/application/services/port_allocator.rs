//! Port allocation against live socket probes.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::collections::HashSet;

use anyhow::Result;
use silo_common::{OrderedMap, PortMap};

use crate::application::ports::PortProbe;
use crate::domain::config::PortSpec;
use crate::domain::error::PortError;
use crate::domain::ports::{EPHEMERAL_RANGE, PortAllocationEvent, PortSource, candidates};

/// Inputs for [`allocate_ports`].
#[derive(Debug, Clone, Copy)]
pub struct AllocationRequest<'a> {
    /// Declared ports in config order.
    pub ports: &'a OrderedMap<PortSpec>,
    /// Ports recorded by a previous run, if any.
    pub recorded: Option<&'a PortMap>,
    /// Ignore recorded ports.
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub ports: PortMap,
    pub events: Vec<PortAllocationEvent>,
}

/// Assign one free port per declared key.
///
/// Keys are processed in declared order. Each tries its recorded port, then
/// its default, then the next free port of a shared ascending cursor over
/// the ephemeral range. Probes run one at a time.
///
/// # Errors
///
/// Returns [`PortError::Exhausted`] when the ephemeral range runs out.
pub async fn allocate_ports(
    probe: &impl PortProbe,
    request: AllocationRequest<'_>,
) -> Result<Allocation> {
    let mut assigned: HashSet<u16> = HashSet::new();
    let mut cursor = u32::from(*EPHEMERAL_RANGE.start());
    let end = u32::from(*EPHEMERAL_RANGE.end());
    let mut ports = PortMap::new();
    let mut events = Vec::with_capacity(request.ports.len());

    for (key, spec) in request.ports.iter() {
        let recorded = request.recorded.and_then(|r| r.get(key)).copied();

        let mut chosen = None;
        for (port, source) in candidates(*spec, recorded, request.force) {
            if !assigned.contains(&port) && probe.is_free(port).await {
                chosen = Some((port, source));
                break;
            }
        }

        if chosen.is_none() {
            while cursor <= end {
                let Ok(port) = u16::try_from(cursor) else { break };
                cursor += 1;
                if !assigned.contains(&port) && probe.is_free(port).await {
                    chosen = Some((port, PortSource::Ephemeral));
                    break;
                }
            }
        }

        let (port, source) = chosen.ok_or(PortError::Exhausted)?;
        assigned.insert(port);
        ports.insert(key, port);
        events.push(PortAllocationEvent {
            key: key.to_string(),
            requested_default: *spec,
            requested_lock: recorded,
            assigned: port,
            source,
        });
    }

    Ok(Allocation { ports, events })
}
