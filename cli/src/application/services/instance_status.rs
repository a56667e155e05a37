//! Instance status: the lockfile record checked against live processes,
//! the cluster backend and the registry ConfigMap.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use silo_common::{OrderedMap, PortMap};

use crate::application::ports::{CommandRunner, LockfileStore, ProcessControl};
use crate::application::services::cluster::cluster_exists;
use crate::application::services::dev_loop::is_dev_loop_alive;
use crate::application::services::lockfile::read_state;
use crate::application::services::registry_advertise::{ConfigMapStatus, configmap_status};
use crate::domain::config::ResolvedConfig;
use crate::domain::instance::resolve_urls;
use crate::domain::profile::apply_profile;
use crate::domain::registry::resolve_advertisement;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    pub name: String,
    pub exists: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryStatus {
    /// k3d registry name; absent for an external registry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Advertised host, when advertisement is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configmap: Option<ConfigMapStatus>,
}

/// Everything `silo status` shows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub instance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tilt_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry: Option<RegistryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,
    pub ports: PortMap,
    pub urls: OrderedMap<String>,
}

/// Summarize the recorded instance. `None` when there is no lockfile.
///
/// `config` is optional: without it urls and the registry advertisement
/// cannot be derived and are left out.
///
/// # Errors
///
/// Returns an error if the lockfile is unreadable, its profile no longer
/// exists, or a url template does not resolve.
pub async fn instance_status(
    host: &(impl CommandRunner + LockfileStore + ProcessControl),
    config: Option<&ResolvedConfig>,
    project_root: &Path,
) -> Result<Option<InstanceStatus>> {
    let Some(state) = read_state(host).await? else {
        return Ok(None);
    };

    let config = match (config, state.profile.as_deref()) {
        (Some(base), Some(profile)) => Some(apply_profile(base, profile)?),
        (Some(base), None) => Some(base.clone()),
        (None, _) => None,
    };

    let running = match state.tilt_pid {
        Some(pid) => is_dev_loop_alive(host, pid).await,
        None => false,
    };

    let cluster = match &state.identity.k3d_cluster_name {
        Some(name) => Some(ClusterStatus {
            name: name.clone(),
            exists: cluster_exists(host, name, project_root).await.unwrap_or(false),
        }),
        None => None,
    };

    let urls = match &config {
        Some(config) => resolve_urls(config, &state)?,
        None => OrderedMap::new(),
    };

    let advert = config
        .as_ref()
        .and_then(|config| resolve_advertisement(config, &state, &urls).ok().flatten());
    let configmap = match &advert {
        Some(advert) => Some(configmap_status(host, advert.kubeconfig(), project_root).await),
        None => None,
    };
    let registry_name = state.identity.k3d_registry_name.clone();
    let registry = if registry_name.is_some() || advert.is_some() {
        Some(RegistryStatus {
            name: registry_name,
            host: advert.as_ref().map(|a| a.hosting().host.clone()),
            configmap,
        })
    } else {
        None
    };

    Ok(Some(InstanceStatus {
        instance: state.name.clone(),
        profile: state.profile.clone(),
        running,
        tilt_pid: state.tilt_pid,
        cluster,
        registry,
        kubeconfig: state.identity.kubeconfig_path.clone(),
        ports: state.ports.clone(),
        urls,
    }))
}
