//! Port allocation against a fake probe.

#![allow(clippy::expect_used)]

use silo_cli::application::services::port_allocator::{AllocationRequest, allocate_ports};
use silo_cli::domain::config::PortSpec;
use silo_cli::domain::ports::PortSource;
use silo_common::OrderedMap;

use crate::helpers::ports;
use crate::mocks::FakeProbe;

fn specs(entries: &[(&str, PortSpec)]) -> OrderedMap<PortSpec> {
    entries.iter().map(|(k, v)| (*k, *v)).collect()
}

#[tokio::test]
async fn free_defaults_are_used_in_declared_order() {
    let probe = FakeProbe::default();
    let declared = specs(&[("WEB_PORT", PortSpec::Fixed(3000)), ("API_PORT", PortSpec::Fixed(8080))]);

    let allocation = allocate_ports(
        &probe,
        AllocationRequest {
            ports: &declared,
            recorded: None,
            force: false,
        },
    )
    .await
    .expect("allocates");

    assert_eq!(allocation.ports, ports(&[("WEB_PORT", 3000), ("API_PORT", 8080)]));
    assert!(allocation.events.iter().all(|e| e.source == PortSource::Default));
    assert_eq!(*probe.probed.borrow(), vec![3000, 8080]);
}

#[tokio::test]
async fn recorded_ports_win_over_defaults() {
    let probe = FakeProbe::default();
    let declared = specs(&[("WEB_PORT", PortSpec::Fixed(3000))]);
    let recorded = ports(&[("WEB_PORT", 3100)]);

    let allocation = allocate_ports(
        &probe,
        AllocationRequest {
            ports: &declared,
            recorded: Some(&recorded),
            force: false,
        },
    )
    .await
    .expect("allocates");

    assert_eq!(allocation.ports.get("WEB_PORT"), Some(&3100));
    assert_eq!(allocation.events[0].source, PortSource::Lockfile);
    assert_eq!(allocation.events[0].requested_lock, Some(3100));
}

#[tokio::test]
async fn force_ignores_recorded_ports() {
    let probe = FakeProbe::default();
    let declared = specs(&[("WEB_PORT", PortSpec::Fixed(3000))]);
    let recorded = ports(&[("WEB_PORT", 3100)]);

    let allocation = allocate_ports(
        &probe,
        AllocationRequest {
            ports: &declared,
            recorded: Some(&recorded),
            force: true,
        },
    )
    .await
    .expect("allocates");

    assert_eq!(allocation.ports.get("WEB_PORT"), Some(&3000));
    assert_eq!(allocation.events[0].source, PortSource::Default);
}

#[tokio::test]
async fn busy_default_falls_back_to_ephemeral_range() {
    let probe = FakeProbe::with_busy(&[3000, 49152]);
    let declared = specs(&[("WEB_PORT", PortSpec::Fixed(3000)), ("API_PORT", PortSpec::Random)]);

    let allocation = allocate_ports(
        &probe,
        AllocationRequest {
            ports: &declared,
            recorded: None,
            force: false,
        },
    )
    .await
    .expect("allocates");

    assert_eq!(allocation.ports.get("WEB_PORT"), Some(&49153));
    assert_eq!(allocation.ports.get("API_PORT"), Some(&49154));
    assert_eq!(allocation.events[0].source, PortSource::Ephemeral);
    assert_eq!(allocation.events[0].requested_default, PortSpec::Fixed(3000));
}

#[tokio::test]
async fn shared_default_is_assigned_once() {
    let probe = FakeProbe::default();
    let declared = specs(&[("WEB_PORT", PortSpec::Fixed(3000)), ("ALT_PORT", PortSpec::Fixed(3000))]);

    let allocation = allocate_ports(
        &probe,
        AllocationRequest {
            ports: &declared,
            recorded: None,
            force: false,
        },
    )
    .await
    .expect("allocates");

    assert_eq!(allocation.ports.get("WEB_PORT"), Some(&3000));
    assert_eq!(allocation.ports.get("ALT_PORT"), Some(&49152));
}
