//! k3d cluster reconciliation.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::Path;

use anyhow::Result;

use crate::application::ports::{CommandRequest, CommandRunner, LocalFs, ProgressReporter};
use crate::application::services::exec::{
    DOCKER_TIMEOUT, K3D_CREATE_TIMEOUT, K3D_DELETE_TIMEOUT, K3D_LIST_TIMEOUT, KUBECONFIG_TIMEOUT,
    run_checked,
};
use crate::domain::cluster::{
    RegistryHealth, cluster_listed, container_live, parse_names, registry_listed,
    strip_debug_output,
};
use crate::domain::error::CommandError;
use crate::domain::registry::parse_registry_list;

/// What [`ensure_cluster`] should converge to.
#[derive(Debug, Clone, Copy)]
pub struct ClusterSpec<'a> {
    pub name: &'a str,
    /// `<host>:<port>` for `--registry-create`.
    pub registry: Option<&'a str>,
    pub args: &'a [String],
    pub cwd: &'a Path,
}

fn k3d<'a>(args: impl IntoIterator<Item = &'a str>, cwd: &Path) -> CommandRequest {
    CommandRequest::new("k3d", args).cwd(cwd)
}

/// Whether the backend lists `name`. A failing listing counts as absent.
///
/// # Errors
///
/// Returns an error if `k3d` cannot be spawned or times out.
pub async fn cluster_exists(runner: &impl CommandRunner, name: &str, cwd: &Path) -> Result<bool> {
    let output = runner
        .run(&k3d(["cluster", "list"], cwd).timeout(K3D_LIST_TIMEOUT))
        .await?;
    Ok(output.success() && cluster_listed(&output.stdout, name))
}

/// Whether `registry` (`<host>:<port>`) still has a live backing container.
///
/// A failing or unparseable listing gives [`RegistryHealth::Unknown`].
///
/// # Errors
///
/// Returns an error if `k3d` or `docker` cannot be spawned or times out.
pub async fn registry_health(
    runner: &impl CommandRunner,
    registry: &str,
    cwd: &Path,
) -> Result<RegistryHealth> {
    let host = registry.split(':').next().unwrap_or(registry);

    let listing = runner
        .run(&k3d(["registry", "list", "-o", "json"], cwd).timeout(K3D_LIST_TIMEOUT))
        .await?;
    let Some(entries) = Some(&listing)
        .filter(|o| o.success())
        .and_then(|o| parse_registry_list(&o.stdout))
    else {
        return Ok(RegistryHealth::Unknown);
    };
    let names: Vec<String> = entries.into_iter().filter_map(|e| e.name).collect();
    if !registry_listed(&names, host) {
        return Ok(RegistryHealth::Stale);
    }

    let containers = runner
        .run(
            &CommandRequest::new("docker", ["ps", "--format", "{{.Names}}"])
                .cwd(cwd)
                .timeout(DOCKER_TIMEOUT),
        )
        .await?;
    if !containers.success() {
        return Ok(RegistryHealth::Unknown);
    }
    if container_live(&parse_names(&containers.stdout), host) {
        Ok(RegistryHealth::Healthy)
    } else {
        Ok(RegistryHealth::Stale)
    }
}

/// Create the cluster with kubeconfig mutation disabled.
///
/// # Errors
///
/// Returns an error if `k3d cluster create` fails or times out.
pub async fn create_cluster(runner: &impl CommandRunner, spec: ClusterSpec<'_>) -> Result<()> {
    let mut args = vec![
        "cluster".to_string(),
        "create".to_string(),
        spec.name.to_string(),
        "--kubeconfig-update-default=false".to_string(),
        "--kubeconfig-switch-context=false".to_string(),
    ];
    if let Some(registry) = spec.registry {
        args.push("--registry-create".to_string());
        args.push(registry.to_string());
    }
    args.extend(spec.args.iter().cloned());
    let request = CommandRequest::new("k3d", args)
        .cwd(spec.cwd)
        .timeout(K3D_CREATE_TIMEOUT)
        .context(&format!("k3d cluster create {}", spec.name));
    run_checked(runner, &request).await?;
    Ok(())
}

/// Delete the cluster.
///
/// # Errors
///
/// Returns an error if `k3d cluster delete` fails or times out.
pub async fn delete_cluster(runner: &impl CommandRunner, name: &str, cwd: &Path) -> Result<()> {
    let request = k3d(["cluster", "delete", name], cwd).timeout(K3D_DELETE_TIMEOUT);
    run_checked(runner, &request).await?;
    Ok(())
}

/// Converge on a running cluster, recreating it when its registry is stale.
///
/// Returns `true` when the cluster was (re)created.
///
/// # Errors
///
/// Returns an error if a listing, create or delete call fails.
pub async fn ensure_cluster(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    spec: ClusterSpec<'_>,
) -> Result<bool> {
    if !cluster_exists(runner, spec.name, spec.cwd).await? {
        reporter.step(&format!("creating k3d cluster '{}'...", spec.name));
        create_cluster(runner, spec).await?;
        return Ok(true);
    }

    let Some(registry) = spec.registry else {
        return Ok(false);
    };

    match registry_health(runner, registry, spec.cwd).await? {
        RegistryHealth::Healthy => Ok(false),
        RegistryHealth::Unknown => {
            reporter.detail(&format!("registry health for '{registry}' unknown, reusing cluster"));
            Ok(false)
        }
        RegistryHealth::Stale => {
            reporter.warn(&format!(
                "Registry '{registry}' is stale, recreating cluster '{}'",
                spec.name
            ));
            delete_cluster(runner, spec.name, spec.cwd).await?;
            create_cluster(runner, spec).await?;
            Ok(true)
        }
    }
}

/// Fetch the cluster kubeconfig, strip log noise, and write it to `path`.
///
/// # Errors
///
/// Returns [`CommandError::Kubeconfig`] if `k3d kubeconfig get` fails, or an
/// error if the file cannot be written.
pub async fn write_kubeconfig(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    cluster: &str,
    path: &Path,
    cwd: &Path,
) -> Result<()> {
    let output = runner
        .run(&k3d(["kubeconfig", "get", cluster], cwd).timeout(KUBECONFIG_TIMEOUT))
        .await?;
    if !output.success() {
        return Err(CommandError::Kubeconfig(cluster.to_string()).into());
    }
    fs.write(path, &strip_debug_output(&output.stdout))
}
