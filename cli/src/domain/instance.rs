//! Pure derivation of an instance once its ports are known.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use silo_common::{InstanceState, OrderedMap, PortMap};

use crate::domain::config::ResolvedConfig;
use crate::domain::identity::{IdentityParams, build_identity, template_vars};
use crate::domain::name::{generate_name, sanitize_name};
use crate::domain::template::{resolve, resolve_record};

/// Where the instance name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSource {
    Arg,
    Lockfile,
    Generated,
}

impl fmt::Display for NameSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Arg => "arg",
            Self::Lockfile => "lockfile",
            Self::Generated => "generated",
        })
    }
}

/// Explicit argument (sanitized), then the lockfile name, then a fresh one.
#[must_use]
pub fn resolve_instance_name(
    arg: Option<&str>,
    locked: Option<&str>,
    project_root: &Path,
) -> (String, NameSource) {
    if let Some(arg) = arg.filter(|a| !a.trim().is_empty()) {
        return (sanitize_name(arg), NameSource::Arg);
    }
    if let Some(locked) = locked.filter(|l| !l.is_empty()) {
        return (locked.to_string(), NameSource::Lockfile);
    }
    (generate_name(project_root), NameSource::Generated)
}

/// Everything derived for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedInstance {
    pub state: InstanceState,
    pub urls: OrderedMap<String>,
    /// `k3d.args` with templates resolved.
    pub cluster_args: Vec<String>,
}

/// Inputs for [`derive_instance`].
#[derive(Debug, Clone, Copy)]
pub struct DeriveParams<'a> {
    pub config: &'a ResolvedConfig,
    pub name: &'a str,
    pub profile: Option<&'a str>,
    /// Already resolved host templates.
    pub hosts: &'a OrderedMap<String>,
    pub ports: &'a PortMap,
    pub created_at: DateTime<Utc>,
    pub kube_dir: &'a Path,
}

/// Build identity, urls and cluster args from allocated ports.
///
/// # Errors
///
/// Returns a config error for a missing registry port, or a template error
/// for an unknown variable in urls or cluster args.
pub fn derive_instance(params: DeriveParams<'_>) -> Result<DerivedInstance> {
    let config = params.config;
    let identity = build_identity(IdentityParams {
        name: params.name,
        prefix: &config.prefix,
        hosts: params.hosts,
        ports: params.ports,
        k3d_enabled: config.k3d_enabled(),
        registry_enabled: config.k3d_registry_enabled(),
        kube_dir: params.kube_dir,
    })?;

    let vars = template_vars(&identity, params.ports, None);
    let urls = resolve_record(&config.urls, &vars)?;
    let vars_with_urls = template_vars(&identity, params.ports, Some(&urls));
    let cluster_args = config
        .k3d
        .as_ref()
        .map(|k| k.args())
        .unwrap_or_default()
        .iter()
        .map(|arg| resolve(arg, &vars_with_urls))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DerivedInstance {
        state: InstanceState {
            name: params.name.to_string(),
            profile: params.profile.map(str::to_string),
            ports: params.ports.clone(),
            identity,
            created_at: params.created_at,
            k3d_cluster_created: false,
            tilt_pid: None,
            tilt_started_at: None,
        },
        urls,
        cluster_args,
    })
}

/// Re-resolve url templates for a persisted instance.
///
/// # Errors
///
/// Returns a template error for an unknown variable.
pub fn resolve_urls(config: &ResolvedConfig, state: &InstanceState) -> Result<OrderedMap<String>> {
    let vars = template_vars(&state.identity, &state.ports, None);
    Ok(resolve_record(&config.urls, &vars)?)
}
