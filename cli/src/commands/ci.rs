//! `silo ci`: prepare the instance and run `tilt ci` to completion.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::instance_up::{CiOptions, prepare_instance, run_ci};

/// Arguments for `silo ci`.
#[derive(Args, Debug, Clone, Default)]
pub struct CiArgs {
    #[command(flatten)]
    pub instance: super::InstanceArgs,

    /// Passed to `tilt ci --timeout` (e.g. `10m`)
    #[arg(long)]
    pub timeout: Option<String>,

    /// Append the instance env vars to $GITHUB_ENV (implied by CI/GITHUB_ACTIONS)
    #[arg(long)]
    pub export_ci: bool,

    /// Extra arguments for `tilt ci`
    #[arg(last = true)]
    pub tilt_args: Vec<String>,
}

/// Run `silo ci`.
///
/// # Errors
///
/// Returns an error if preparation fails, exporting is requested without
/// `GITHUB_ENV`, or `tilt ci` fails.
pub async fn run(app: &AppContext, args: &CiArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    let host = app.host(&config.project_root);
    let reporter = app.reporter();

    let prepared =
        prepare_instance(&host, &reporter, &config, &args.instance.options(app)).await?;

    let opts = CiOptions {
        timeout: args.timeout.clone(),
        export: args.export_ci || app.env.ci,
        tilt_args: args.tilt_args.clone(),
    };
    run_ci(&host, &reporter, &prepared, &opts, app.env.github_env.as_deref()).await?;
    Ok(ExitCode::SUCCESS)
}
