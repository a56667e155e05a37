//! `silo env`: write the env file and lockfile without starting anything.

use std::process::ExitCode;

use anyhow::Result;
use serde::Serialize;
use silo_common::{OrderedMap, PortMap};

use crate::app::AppContext;
use crate::application::services::instance_up::{PreparedInstance, resolve_instance};
use crate::output::{OutputContext, json};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvSummary<'a> {
    instance: &'a str,
    env_file: &'a std::path::Path,
    ports: &'a PortMap,
    urls: &'a OrderedMap<String>,
}

/// Print the ports and urls of `prepared` under their headers.
pub(crate) fn print_endpoints(ctx: &OutputContext, prepared: &PreparedInstance) {
    ctx.header("Ports:");
    for (key, port) in prepared.state.ports.iter() {
        ctx.kv(key, &port.to_string());
    }
    if !prepared.urls.is_empty() {
        ctx.header("URLs:");
        for (key, url) in prepared.urls.iter() {
            ctx.kv(key, url);
        }
    }
}

/// Run `silo env`.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded, the profile selection
/// is rejected, ports cannot be allocated, or a file cannot be written.
pub async fn run(app: &AppContext, args: &super::InstanceArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    let host = app.host(&config.project_root);
    let reporter = app.reporter();
    let ctx = &app.output;

    ctx.detail(&format!("Config path: {}", config.config_path.display()));
    let prepared = resolve_instance(&host, &reporter, &config, &args.options(app)).await?;

    if app.is_json() {
        json::print(&EnvSummary {
            instance: &prepared.state.name,
            env_file: &prepared.env_file,
            ports: &prepared.state.ports,
            urls: &prepared.urls,
        })?;
        return Ok(ExitCode::SUCCESS);
    }

    ctx.success(&format!("Generated env file at {}", prepared.env_file.display()));
    ctx.success("Wrote lockfile");
    print_endpoints(ctx, &prepared);
    Ok(ExitCode::SUCCESS)
}
