//! Instance identity and the variable tiers templates resolve against.

use std::path::Path;

use silo_common::{InstanceIdentity, OrderedMap, PortMap, REGISTRY_PORT_KEY};

use crate::domain::config::{APP_HOST_KEY, TILT_HOST_KEY};
use crate::domain::error::{ConfigError, TemplateError};
use crate::domain::name::{MAX_CLUSTER_NAME_LEN, shorten_cluster_name};
use crate::domain::template::{TemplateVars, resolve};

/// `prefix-name`, shared by compose project, network and volumes.
#[must_use]
pub fn compose_name(prefix: &str, name: &str) -> String {
    format!("{prefix}-{name}")
}

/// First tier: the variables host templates may use.
#[must_use]
pub fn identity_vars(name: &str, prefix: &str) -> TemplateVars {
    TemplateVars::from([
        ("name".to_string(), name.to_string()),
        ("prefix".to_string(), prefix.to_string()),
        ("WORKSPACE_NAME".to_string(), name.to_string()),
        ("COMPOSE_PROJECT_NAME".to_string(), compose_name(prefix, name)),
    ])
}

/// Resolve host templates; `TILT_HOST` always mirrors `APP_HOST`.
///
/// # Errors
///
/// Returns a template error for unknown variables.
pub fn resolve_hosts(
    templates: &OrderedMap<String>,
    vars: &TemplateVars,
) -> Result<OrderedMap<String>, TemplateError> {
    let mut hosts = OrderedMap::new();
    for (key, template) in templates.iter() {
        hosts.insert(key, resolve(template, vars)?);
    }
    if let Some(app_host) = hosts.get(APP_HOST_KEY).cloned() {
        hosts.insert(TILT_HOST_KEY, app_host);
    }
    Ok(hosts)
}

/// Inputs for [`build_identity`].
#[derive(Debug, Clone, Copy)]
pub struct IdentityParams<'a> {
    pub name: &'a str,
    pub prefix: &'a str,
    pub hosts: &'a OrderedMap<String>,
    pub ports: &'a PortMap,
    pub k3d_enabled: bool,
    pub registry_enabled: bool,
    /// Directory kubeconfigs are written to (normally `~/.kube`).
    pub kube_dir: &'a Path,
}

/// Registry name handed to `k3d --registry-create`.
#[must_use]
pub fn registry_name(cluster_name: &str, port: u16) -> String {
    format!("{cluster_name}-registry.localhost:{port}")
}

/// Derive every name an instance uses.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the registry is enabled but no
/// `K3D_REGISTRY_PORT` was allocated.
pub fn build_identity(params: IdentityParams<'_>) -> Result<InstanceIdentity, ConfigError> {
    let compose = compose_name(params.prefix, params.name);

    let (k3d_cluster_name, kubeconfig_path) = if params.k3d_enabled {
        (
            Some(shorten_cluster_name(&compose, MAX_CLUSTER_NAME_LEN)),
            Some(params.kube_dir.join(&compose)),
        )
    } else {
        (None, None)
    };

    let k3d_registry_name = match (&k3d_cluster_name, params.registry_enabled) {
        (Some(cluster), true) => {
            let port = params.ports.get(REGISTRY_PORT_KEY).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "{REGISTRY_PORT_KEY} must be defined in ports when registry is enabled"
                ))
            })?;
            Some(registry_name(cluster, *port))
        }
        _ => None,
    };

    Ok(InstanceIdentity {
        name: params.name.to_string(),
        prefix: params.prefix.to_string(),
        docker_network: compose.clone(),
        volume_prefix: compose.clone(),
        container_prefix: format!("{compose}-"),
        compose_name: compose,
        hosts: params.hosts.clone(),
        k3d_cluster_name,
        k3d_registry_name,
        kubeconfig_path,
    })
}

/// Identity values exported to the environment.
#[must_use]
pub fn identity_env_vars(identity: &InstanceIdentity) -> OrderedMap<String> {
    [
        ("WORKSPACE_NAME", identity.name.clone()),
        ("COMPOSE_PROJECT_NAME", identity.compose_name.clone()),
        ("DOCKER_NETWORK", identity.docker_network.clone()),
        ("VOLUME_PREFIX", identity.volume_prefix.clone()),
        ("CONTAINER_PREFIX", identity.container_prefix.clone()),
    ]
    .into_iter()
    .collect()
}

/// Cluster-derived values, in export order. Absent values are skipped.
#[must_use]
pub fn cluster_vars(identity: &InstanceIdentity) -> OrderedMap<String> {
    let mut vars = OrderedMap::new();
    if let Some(cluster) = &identity.k3d_cluster_name {
        vars.insert("K3D_CLUSTER_NAME", cluster.clone());
    }
    if let Some(registry) = &identity.k3d_registry_name {
        vars.insert("K3D_REGISTRY_NAME", registry.clone());
    }
    if let Some(kubeconfig) = &identity.kubeconfig_path {
        vars.insert("KUBECONFIG", kubeconfig.display().to_string());
    }
    vars
}

/// Variables for url templates (and, with `urls`, for cluster args and
/// registry advertisement templates).
#[must_use]
pub fn template_vars(
    identity: &InstanceIdentity,
    ports: &PortMap,
    urls: Option<&OrderedMap<String>>,
) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("name".to_string(), identity.name.clone());
    vars.insert("prefix".to_string(), identity.prefix.clone());
    let tiers = [identity_env_vars(identity), identity.hosts.clone()];
    for (key, value) in tiers.iter().flat_map(OrderedMap::iter) {
        vars.insert(key.to_string(), value.clone());
    }
    for (key, port) in ports.iter() {
        vars.insert(key.to_string(), port.to_string());
    }
    for (key, value) in cluster_vars(identity).iter() {
        vars.insert(key.to_string(), value.clone());
    }
    if let Some(urls) = urls {
        for (key, value) in urls.iter() {
            vars.insert(key.to_string(), value.clone());
        }
    }
    vars
}
