use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderedMap;

/// Current lockfile envelope version.
pub const LOCKFILE_VERSION: u32 = 1;

/// Lockfile file name, relative to the project root.
pub const LOCKFILE_NAME: &str = ".silo.lock";

/// Port key that carries the k3d registry host port.
pub const REGISTRY_PORT_KEY: &str = "K3D_REGISTRY_PORT";

/// Logical port key → concrete port.
pub type PortMap = OrderedMap<u16>;

/// Derived names for one instance.
///
/// Optional fields are absent when the feature that needs them is disabled:
/// cluster name and kubeconfig path only exist with k3d enabled, the registry
/// name only with the k3d registry enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIdentity {
    pub name: String,
    pub prefix: String,
    pub compose_name: String,
    pub docker_network: String,
    pub volume_prefix: String,
    pub container_prefix: String,
    pub hosts: OrderedMap<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k3d_cluster_name: Option<String>,
    /// `<host>:<port>` as handed to `k3d --registry-create`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k3d_registry_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig_path: Option<PathBuf>,
}

impl InstanceIdentity {
    /// Registry host without the port suffix.
    #[must_use]
    pub fn registry_host(&self) -> Option<&str> {
        self.k3d_registry_name
            .as_deref()
            .map(|name| name.split(':').next().unwrap_or(name))
    }
}

/// The unit persisted in the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceState {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub ports: PortMap,
    pub identity: InstanceIdentity,
    pub created_at: DateTime<Utc>,
    pub k3d_cluster_created: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt_pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tilt_started_at: Option<DateTime<Utc>>,
}

impl InstanceState {
    /// Record a freshly spawned dev-loop process.
    pub fn track_process(&mut self, pid: u32, started_at: DateTime<Utc>) {
        self.tilt_pid = Some(pid);
        self.tilt_started_at = Some(started_at);
    }

    /// Forget the dev-loop process.
    pub fn clear_process(&mut self) {
        self.tilt_pid = None;
        self.tilt_started_at = None;
    }

    #[must_use]
    pub fn has_process_fields(&self) -> bool {
        self.tilt_pid.is_some() || self.tilt_started_at.is_some()
    }
}

/// Versioned lockfile envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub instance: InstanceState,
}

impl Lockfile {
    /// Wrap an instance in a fresh envelope stamped with the current time.
    #[must_use]
    pub fn new(instance: InstanceState) -> Self {
        Self {
            version: LOCKFILE_VERSION,
            generated_at: Utc::now(),
            instance,
        }
    }
}
