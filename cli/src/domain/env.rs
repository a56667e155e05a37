//! Environment values handed to hooks and the dev loop, and the env file.

use std::fmt::Write as _;
use std::path::Path;

use silo_common::{InstanceState, OrderedMap};

use crate::domain::identity::{cluster_vars, identity_env_vars};

/// Marker variables for child processes.
pub const SILO_ACTIVE: &str = "SILO_ACTIVE";
pub const SILO_WORKSPACE: &str = "SILO_WORKSPACE";
pub const SILO_ENV_FILE: &str = "SILO_ENV_FILE";

/// Exported instance values: identity, hosts, ports, cluster, urls.
#[must_use]
pub fn env_vars(state: &InstanceState, urls: &OrderedMap<String>) -> OrderedMap<String> {
    let mut vars = identity_env_vars(&state.identity);
    vars.extend(state.identity.hosts.iter().map(|(k, v)| (k, v.clone())));
    vars.extend(state.ports.iter().map(|(k, p)| (k, p.to_string())));
    vars.extend(cluster_vars(&state.identity));
    vars.extend(urls.iter().map(|(k, v)| (k, v.clone())));
    vars
}

/// Markers telling child processes they run under silo.
#[must_use]
pub fn process_env(state: &InstanceState, env_file: &Path) -> OrderedMap<String> {
    [
        (SILO_ACTIVE, "1".to_string()),
        (SILO_WORKSPACE, state.name.clone()),
        (SILO_ENV_FILE, env_file.display().to_string()),
    ]
    .into_iter()
    .collect()
}

/// Instance values plus process markers, as passed to every spawn.
#[must_use]
pub fn child_env(
    state: &InstanceState,
    urls: &OrderedMap<String>,
    env_file: &Path,
) -> OrderedMap<String> {
    let mut vars = env_vars(state, urls);
    vars.extend(process_env(state, env_file));
    vars
}

fn section(out: &mut String, title: &str, entries: &OrderedMap<String>) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n# {title}");
    for (key, value) in entries.iter() {
        let _ = writeln!(out, "{key}={value}");
    }
}

/// Render the `.env` file, grouped and in declared order.
#[must_use]
pub fn render_env_file(state: &InstanceState, urls: &OrderedMap<String>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Generated by silo for instance '{}'. Do not edit.", state.name);
    if let Some(profile) = &state.profile {
        let _ = writeln!(out, "# Profile: {profile}");
    }
    section(&mut out, "Identity", &identity_env_vars(&state.identity));
    section(&mut out, "Hosts", &state.identity.hosts);
    let ports: OrderedMap<String> = state
        .ports
        .iter()
        .map(|(k, p)| (k, p.to_string()))
        .collect();
    section(&mut out, "Ports", &ports);
    section(&mut out, "Cluster", &cluster_vars(&state.identity));
    section(&mut out, "URLs", urls);
    out
}

/// `KEY=value` lines appended to `$GITHUB_ENV`.
#[must_use]
pub fn render_github_env(state: &InstanceState, urls: &OrderedMap<String>) -> String {
    env_vars(state, urls)
        .iter()
        .fold(String::new(), |mut out, (key, value)| {
            let _ = writeln!(out, "{key}={value}");
            out
        })
}

/// `CI`-style truthiness: set, non-empty, and not `0`/`false`.
#[must_use]
pub fn is_truthy(value: Option<&str>) -> bool {
    value
        .map(|v| v.trim().to_ascii_lowercase())
        .is_some_and(|v| !v.is_empty() && v != "0" && v != "false")
}
