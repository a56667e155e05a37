//! Publishing the `local-registry-hosting` ConfigMap.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::ports::{CommandRequest, CommandRunner, LocalFs, ProgressReporter};
use crate::application::retry::{RetryPolicy, with_retry};
use crate::application::services::exec::{KUBECTL_TIMEOUT, run_checked};
use crate::domain::registry::{
    CONFIGMAP_NAME, CONFIGMAP_NAMESPACE, RegistryAdvertisement, configmap_manifest,
};

const MANIFEST_FILE: &str = "local-registry-hosting.yaml";

/// Whether the ConfigMap exists in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigMapStatus {
    Present,
    Missing,
    Unknown,
}

impl ConfigMapStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Missing => "missing",
            Self::Unknown => "unknown",
        }
    }
}

fn with_kubeconfig(request: CommandRequest, kubeconfig: Option<&Path>) -> CommandRequest {
    match kubeconfig {
        Some(path) => request.env("KUBECONFIG", &path.display().to_string()),
        None => request,
    }
}

/// Apply the ConfigMap describing `advert`, retrying with backoff.
///
/// The manifest lives in a scratch directory that is removed on every exit
/// path.
///
/// # Errors
///
/// Returns an error if the manifest cannot be rendered or written, or the
/// last `kubectl apply` failure.
pub async fn advertise_registry(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    advert: &RegistryAdvertisement,
    cwd: &Path,
    policy: RetryPolicy,
) -> Result<()> {
    let manifest = configmap_manifest(advert.hosting())?;
    let scratch = fs.scratch_dir("silo-registry-")?;
    let path = scratch.path().join(MANIFEST_FILE);
    fs.write(&path, &manifest)?;

    let path_arg = path.display().to_string();
    let request = with_kubeconfig(
        CommandRequest::new("kubectl", ["apply", "-f", path_arg.as_str()])
            .cwd(cwd)
            .timeout(KUBECTL_TIMEOUT)
            .context(&format!("kubectl apply {CONFIGMAP_NAMESPACE}/{CONFIGMAP_NAME}")),
        advert.kubeconfig(),
    );

    reporter.step("advertising registry via ConfigMap...");
    with_retry(
        policy,
        |attempt, err| reporter.detail(&format!("registry advertisement attempt {attempt} failed: {err}")),
        |_| run_checked(runner, &request),
    )
    .await
    .context("advertising local registry")?;

    reporter.success(&format!(
        "registry {} advertised ({})",
        advert.hosting().host,
        advert.source()
    ));
    Ok(())
}

/// Look the ConfigMap up with `kubectl get`.
pub async fn configmap_status(
    runner: &impl CommandRunner,
    kubeconfig: Option<&Path>,
    cwd: &Path,
) -> ConfigMapStatus {
    let request = with_kubeconfig(
        CommandRequest::new(
            "kubectl",
            ["get", "configmap", CONFIGMAP_NAME, "-n", CONFIGMAP_NAMESPACE],
        )
        .cwd(cwd)
        .timeout(KUBECTL_TIMEOUT),
        kubeconfig,
    );
    match runner.run(&request).await {
        Ok(output) if output.success() => ConfigMapStatus::Present,
        Ok(output) if output.stderr.contains("NotFound") || output.stderr.contains("not found") => {
            ConfigMapStatus::Missing
        }
        _ => ConfigMapStatus::Unknown,
    }
}
