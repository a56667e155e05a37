//! `silo status`: show the recorded instance and what is actually running.

use std::process::ExitCode;

use anyhow::{Context, Result};

use crate::app::AppContext;
use crate::application::services::instance_status::{InstanceStatus, instance_status};
use crate::domain::error::ConfigError;
use crate::output::{OutputContext, json};

/// Run `silo status`.
///
/// Without a config file the current directory is the project root and
/// urls are not shown.
///
/// # Errors
///
/// Returns an error if the config is invalid or the lockfile is unreadable.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = match app.load_config() {
        Ok(config) => Some(config),
        Err(err) if matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::NotFound(_))) => {
            None
        }
        Err(err) => return Err(err),
    };
    let project_root = match &config {
        Some(config) => config.project_root.clone(),
        None => std::env::current_dir().context("cannot determine current directory")?,
    };
    if let Some(config) = &config {
        app.output
            .detail(&format!("Config path: {}", config.config_path.display()));
    }

    let host = app.host(&project_root);
    let status = instance_status(&host, config.as_ref(), &project_root).await?;

    if app.is_json() {
        match &status {
            Some(status) => json::print(status)?,
            None => json::print(&serde_json::json!({ "instance": null }))?,
        }
        return Ok(ExitCode::SUCCESS);
    }

    match status {
        Some(status) => render(&app.output, &status),
        None => app.output.info("No active instance. Run 'silo up' to start."),
    }
    Ok(ExitCode::SUCCESS)
}

fn render(ctx: &OutputContext, status: &InstanceStatus) {
    ctx.kv("Instance", &status.instance);
    if let Some(profile) = &status.profile {
        ctx.kv("Profile", profile);
    }
    ctx.kv("State", if status.running { "running" } else { "stopped" });
    if let Some(pid) = status.tilt_pid {
        let tilt = if status.running {
            format!("pid {pid}")
        } else {
            "not running".to_string()
        };
        ctx.kv("Tilt", &tilt);
    }
    if let Some(cluster) = &status.cluster {
        let state = if cluster.exists { "running" } else { "missing" };
        ctx.kv("k3d", &format!("{} ({state})", cluster.name));
    }
    if let Some(registry) = &status.registry {
        let label = match (&registry.name, &registry.host) {
            (Some(name), Some(host)) => format!("{name} (host {host})"),
            (Some(name), None) => name.clone(),
            (None, Some(host)) => format!("{host} (external)"),
            (None, None) => String::new(),
        };
        ctx.kv("Registry", &label);
    }
    if let Some(kubeconfig) = &status.kubeconfig {
        ctx.kv("Kubeconfig", &kubeconfig.display().to_string());
    }

    ctx.header("Ports:");
    for (key, port) in status.ports.iter() {
        ctx.kv(key, &port.to_string());
    }
    if let Some(configmap) = status.registry.as_ref().and_then(|r| r.configmap) {
        ctx.kv("Registry ConfigMap", configmap.as_str());
    }
    if !status.urls.is_empty() {
        ctx.header("URLs:");
        for (key, url) in status.urls.iter() {
            ctx.kv(key, url);
        }
    }
}
