//! Resolution of the host port a k3d registry actually bound.
//!
//! k3d may move the registry off the requested port when it collides. The
//! registry listing is asked first; the container engine is the fallback.

use std::path::Path;

use anyhow::Result;

use crate::application::ports::{CommandRequest, CommandRunner, ProgressReporter};
use crate::application::retry::{RetryPolicy, with_retry_if};
use crate::application::services::exec::{DOCKER_TIMEOUT, K3D_LIST_TIMEOUT};
use crate::domain::cluster::parse_names;
use crate::domain::error::RegistryError;
use crate::domain::registry::{
    NameMatch, REGISTRY_CONTAINER_PORT, parse_docker_port, parse_registry_list,
    select_registry_container, select_registry_entry,
};

fn is_ambiguous(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<RegistryError>(),
        Some(RegistryError::ContainerAmbiguous { .. })
    )
}

/// Host port from `k3d registry list -o json`.
///
/// # Errors
///
/// Returns a [`RegistryError`] when the listing fails, cannot be parsed, or
/// has no usable entry.
pub async fn port_from_registry_list(
    runner: &impl CommandRunner,
    host: &str,
    cwd: &Path,
) -> Result<u16> {
    let output = runner
        .run(
            &CommandRequest::new("k3d", ["registry", "list", "-o", "json"])
                .cwd(cwd)
                .timeout(K3D_LIST_TIMEOUT),
        )
        .await?;
    if !output.success() {
        return Err(RegistryError::PortFailed(host.to_string()).into());
    }
    let entries = parse_registry_list(&output.stdout)
        .ok_or_else(|| RegistryError::PortInvalid(host.to_string()))?;
    match select_registry_entry(&entries, host) {
        NameMatch::Found(entry) => entry
            .host_port()
            .ok_or_else(|| RegistryError::PortInvalid(host.to_string()).into()),
        NameMatch::Ambiguous(candidates) => Err(RegistryError::ContainerAmbiguous {
            host: host.to_string(),
            candidates,
        }
        .into()),
        NameMatch::NotFound => Err(RegistryError::PortInvalid(host.to_string()).into()),
    }
}

/// Host port from `docker ps` plus `docker port`.
///
/// # Errors
///
/// Returns a [`RegistryError`] when no single container matches or its
/// port mapping cannot be read.
pub async fn port_from_container(
    runner: &impl CommandRunner,
    host: &str,
    cwd: &Path,
) -> Result<u16> {
    let filter = format!("name={host}");
    let listing = runner
        .run(
            &CommandRequest::new("docker", ["ps", "--filter", filter.as_str(), "--format", "{{.Names}}"])
                .cwd(cwd)
                .timeout(DOCKER_TIMEOUT),
        )
        .await?;
    if !listing.success() {
        return Err(RegistryError::ContainerListFailed(host.to_string()).into());
    }
    let names = parse_names(&listing.stdout);
    let container = match select_registry_container(&names, host) {
        NameMatch::Found(name) => name,
        NameMatch::NotFound => return Err(RegistryError::ContainerMissing(host.to_string()).into()),
        NameMatch::Ambiguous(candidates) => {
            return Err(RegistryError::ContainerAmbiguous {
                host: host.to_string(),
                candidates,
            }
            .into());
        }
    };

    let internal = REGISTRY_CONTAINER_PORT.to_string();
    let port = runner
        .run(
            &CommandRequest::new("docker", ["port", container, internal.as_str()])
                .cwd(cwd)
                .timeout(DOCKER_TIMEOUT),
        )
        .await?;
    if !port.success() {
        return Err(RegistryError::PortFailed(host.to_string()).into());
    }
    parse_docker_port(&port.stdout).ok_or_else(|| RegistryError::PortInvalid(host.to_string()).into())
}

/// One resolution attempt: registry listing, then the container fallback.
///
/// # Errors
///
/// Returns the fallback's error, or an ambiguity error from either path.
pub async fn resolve_once(runner: &impl CommandRunner, host: &str, cwd: &Path) -> Result<u16> {
    match port_from_registry_list(runner, host, cwd).await {
        Ok(port) => Ok(port),
        Err(err) if is_ambiguous(&err) => Err(err),
        Err(_) => port_from_container(runner, host, cwd).await,
    }
}

/// Resolve the bound host port of `registry` (`<host>:<port>`), retrying
/// with backoff. Ambiguous matches are not retried.
///
/// # Errors
///
/// Returns the last resolution error once the attempts are spent.
pub async fn resolve_registry_port(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    registry: &str,
    cwd: &Path,
    policy: RetryPolicy,
) -> Result<u16> {
    let host = registry.split(':').next().unwrap_or(registry);
    with_retry_if(
        policy,
        |err| !is_ambiguous(err),
        |attempt, err| reporter.detail(&format!("registry port lookup attempt {attempt} failed: {err}")),
        |_| resolve_once(runner, host, cwd),
    )
    .await
}
