//! Registry port drift, registry lookup parsing and advertisement settings.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use silo_common::{InstanceState, OrderedMap, REGISTRY_PORT_KEY};

use crate::domain::config::ResolvedConfig;
use crate::domain::error::{ConfigError, InstanceError};
use crate::domain::identity::{registry_name, template_vars};
use crate::domain::template::{resolve, resolve_record};

pub const CONFIGMAP_NAME: &str = "local-registry-hosting";
pub const CONFIGMAP_NAMESPACE: &str = "kube-public";
pub const CONFIGMAP_KEY: &str = "localRegistryHosting.v1";

/// Port the registry listens on inside the container network.
pub const REGISTRY_CONTAINER_PORT: u16 = 5000;

static DOCKER_PORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r":(\d+)\s*$").expect("valid regex")
});

// ── Port drift ───────────────────────────────────────────────────────────────

/// Outcome of reconciling the requested registry port with the real one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPortOverride {
    pub changed: bool,
    pub state: InstanceState,
    pub urls: OrderedMap<String>,
}

/// Replace `K3D_REGISTRY_PORT` with the port the registry actually bound.
///
/// Urls are always recomputed; identity is rebuilt only when the port
/// changed.
///
/// # Errors
///
/// Returns [`InstanceError::InvalidState`] when the instance has no
/// registry port or cluster name, and a template error from url resolution.
pub fn apply_registry_port_override(
    config: &ResolvedConfig,
    state: &InstanceState,
    actual_port: u16,
) -> Result<RegistryPortOverride> {
    let Some(requested) = state.ports.get(REGISTRY_PORT_KEY).copied() else {
        return Err(InstanceError::InvalidState(format!(
            "{REGISTRY_PORT_KEY} is missing from the instance ports"
        ))
        .into());
    };

    let mut next = state.clone();
    let changed = requested != actual_port;
    if changed {
        let cluster = state.identity.k3d_cluster_name.as_deref().ok_or_else(|| {
            InstanceError::InvalidState("registry is enabled but no cluster name is recorded".into())
        })?;
        next.ports.insert(REGISTRY_PORT_KEY, actual_port);
        next.identity.k3d_registry_name = Some(registry_name(cluster, actual_port));
    }

    let vars = template_vars(&next.identity, &next.ports, None);
    let urls = resolve_record(&config.urls, &vars)?;
    Ok(RegistryPortOverride {
        changed,
        state: next,
        urls,
    })
}

// ── Registry lookups ─────────────────────────────────────────────────────────

/// Result of picking one item out of a listing by host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameMatch<T> {
    Found(T),
    Ambiguous(Vec<String>),
    NotFound,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortBinding {
    #[serde(rename = "HostPort", default)]
    pub host_port: Option<String>,
}

/// One entry of `k3d registry list -o json`.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryEntry {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "portMappings", default)]
    pub port_mappings: Option<HashMap<String, Vec<PortBinding>>>,
}

impl RegistryEntry {
    /// First host port published for the registry's container port.
    #[must_use]
    pub fn host_port(&self) -> Option<u16> {
        self.port_mappings
            .as_ref()?
            .get(&format!("{REGISTRY_CONTAINER_PORT}/tcp"))?
            .iter()
            .filter_map(|b| b.host_port.as_deref())
            .find_map(|p| p.trim().parse().ok().filter(|port: &u16| *port != 0))
    }
}

/// `None` when the output is not a JSON array of registries.
#[must_use]
pub fn parse_registry_list(output: &str) -> Option<Vec<RegistryEntry>> {
    serde_json::from_str(output.trim()).ok()
}

/// Exact name, then a single suffix match, then the only entry.
#[must_use]
pub fn select_registry_entry<'a>(
    entries: &'a [RegistryEntry],
    host: &str,
) -> NameMatch<&'a RegistryEntry> {
    if let Some(entry) = entries.iter().find(|e| e.name.as_deref() == Some(host)) {
        return NameMatch::Found(entry);
    }
    let suffixed: Vec<&RegistryEntry> = entries
        .iter()
        .filter(|e| e.name.as_deref().is_some_and(|n| n.ends_with(host)))
        .collect();
    if suffixed.len() > 1 {
        return NameMatch::Ambiguous(
            suffixed
                .iter()
                .filter_map(|e| e.name.clone())
                .collect(),
        );
    }
    match suffixed.first().copied() {
        Some(entry) => NameMatch::Found(entry),
        None if entries.len() == 1 => NameMatch::Found(&entries[0]),
        None => NameMatch::NotFound,
    }
}

/// Exact name, then `k3d-` prefixed, then a single suffix match, then the
/// only container. Containers come pre-filtered by name, so anything else is
/// ambiguous.
#[must_use]
pub fn select_registry_container<'a>(names: &'a [String], host: &str) -> NameMatch<&'a str> {
    if names.is_empty() {
        return NameMatch::NotFound;
    }
    let prefixed = format!("k3d-{host}");
    if let Some(name) = names.iter().find(|n| *n == host) {
        return NameMatch::Found(name.as_str());
    }
    if let Some(name) = names.iter().find(|n| **n == prefixed) {
        return NameMatch::Found(name.as_str());
    }
    let mut suffixed = names.iter().filter(|n| n.ends_with(host));
    match (suffixed.next(), suffixed.next()) {
        (Some(name), None) => NameMatch::Found(name.as_str()),
        (None, _) if names.len() == 1 => NameMatch::Found(names[0].as_str()),
        _ => NameMatch::Ambiguous(names.to_vec()),
    }
}

/// Host port from `docker port <container> 5000` output.
#[must_use]
pub fn parse_docker_port(output: &str) -> Option<u16> {
    output
        .lines()
        .filter_map(|line| DOCKER_PORT_RE.captures(line.trim()))
        .find_map(|caps| caps[1].parse().ok().filter(|port: &u16| *port != 0))
}

// ── Advertisement ────────────────────────────────────────────────────────────

/// Payload of the `localRegistryHosting.v1` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalRegistryHosting {
    pub host: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_from_container_runtime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_from_cluster_network: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

/// Which registry is advertised, with what the publisher needs for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryAdvertisement {
    /// The registry k3d created; the instance kubeconfig is mandatory.
    K3d {
        hosting: LocalRegistryHosting,
        kubeconfig: PathBuf,
    },
    /// A registry configured under `[registry]`; kubectl uses the ambient
    /// context unless the instance has its own kubeconfig.
    External {
        hosting: LocalRegistryHosting,
        kubeconfig: Option<PathBuf>,
    },
}

impl RegistryAdvertisement {
    #[must_use]
    pub fn hosting(&self) -> &LocalRegistryHosting {
        match self {
            Self::K3d { hosting, .. } | Self::External { hosting, .. } => hosting,
        }
    }

    #[must_use]
    pub fn kubeconfig(&self) -> Option<&Path> {
        match self {
            Self::K3d { kubeconfig, .. } => Some(kubeconfig),
            Self::External { kubeconfig, .. } => kubeconfig.as_deref(),
        }
    }

    #[must_use]
    pub fn source(&self) -> &'static str {
        match self {
            Self::K3d { .. } => "k3d",
            Self::External { .. } => "registry",
        }
    }
}

/// Settings for the `local-registry-hosting` ConfigMap, or `None` when
/// nothing should be advertised.
///
/// # Errors
///
/// Returns [`InstanceError::InvalidState`] when a k3d registry has no
/// kubeconfig, [`ConfigError::Invalid`] when an external registry lacks a
/// host, and a template error for unknown variables.
pub fn resolve_advertisement(
    config: &ResolvedConfig,
    state: &InstanceState,
    urls: &OrderedMap<String>,
) -> Result<Option<RegistryAdvertisement>> {
    let vars = template_vars(&state.identity, &state.ports, Some(urls));
    let opt = |value: Option<&String>| value.map(|v| resolve(v, &vars)).transpose();

    let k3d_registry = config
        .k3d
        .as_ref()
        .filter(|k| k.registry_enabled())
        .and_then(|k| k.registry.as_ref())
        .filter(|r| r.advertise != Some(false));
    if let (Some(registry), Some(registry_host)) = (k3d_registry, state.identity.registry_host()) {
        let kubeconfig = state.identity.kubeconfig_path.clone().ok_or_else(|| {
            InstanceError::InvalidState("k3d registry advertisement requires a kubeconfig".into())
        })?;
        let in_network = format!("{registry_host}:{REGISTRY_CONTAINER_PORT}");
        let hosting = LocalRegistryHosting {
            host: match &registry.host {
                Some(template) => resolve(template, &vars)?,
                None => {
                    let port = state.ports.get(REGISTRY_PORT_KEY).copied().unwrap_or_default();
                    format!("localhost:{port}")
                }
            },
            host_from_container_runtime: Some(
                opt(registry.host_from_container_runtime.as_ref())?
                    .unwrap_or_else(|| in_network.clone()),
            ),
            host_from_cluster_network: Some(
                opt(registry.host_from_cluster_network.as_ref())?.unwrap_or(in_network),
            ),
            help: opt(registry.help.as_ref())?,
        };
        return Ok(Some(RegistryAdvertisement::K3d {
            hosting,
            kubeconfig,
        }));
    }

    let Some(external) = config
        .registry
        .as_ref()
        .filter(|r| r.advertise != Some(false))
    else {
        return Ok(None);
    };
    let host = external
        .host
        .as_ref()
        .ok_or_else(|| ConfigError::Invalid("registry.host is required to advertise a registry".into()))?;
    Ok(Some(RegistryAdvertisement::External {
        hosting: LocalRegistryHosting {
            host: resolve(host, &vars)?,
            host_from_container_runtime: opt(external.host_from_container_runtime.as_ref())?,
            host_from_cluster_network: opt(external.host_from_cluster_network.as_ref())?,
            help: opt(external.help.as_ref())?,
        },
        kubeconfig: state.identity.kubeconfig_path.clone(),
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigMap<'a> {
    api_version: &'a str,
    kind: &'a str,
    metadata: Metadata<'a>,
    data: BTreeMap<&'a str, String>,
}

#[derive(Serialize)]
struct Metadata<'a> {
    name: &'a str,
    namespace: &'a str,
}

/// The ConfigMap manifest passed to `kubectl apply -f`.
///
/// # Errors
///
/// Returns an error if YAML serialization fails.
pub fn configmap_manifest(hosting: &LocalRegistryHosting) -> Result<String> {
    let payload = serde_yaml::to_string(hosting)?;
    let manifest = ConfigMap {
        api_version: "v1",
        kind: "ConfigMap",
        metadata: Metadata {
            name: CONFIGMAP_NAME,
            namespace: CONFIGMAP_NAMESPACE,
        },
        data: BTreeMap::from([(CONFIGMAP_KEY, payload)]),
    };
    Ok(serde_yaml::to_string(&manifest)?)
}
