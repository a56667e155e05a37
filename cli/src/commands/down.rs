//! `silo down`: stop the dev loop and optionally remove the cluster.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::dev_loop::{StopOutcome, StopPolicy, stop_dev_loop};
use crate::application::services::instance_down::{
    DownOptions, begin_down, finish_down, live_dev_loop,
};
use crate::output::progress;

/// Arguments for `silo down`.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct DownArgs {
    /// Delete the k3d cluster (kept by default for faster iteration)
    #[arg(long)]
    pub delete_cluster: bool,

    /// Remove the env file and lockfile
    #[arg(long)]
    pub clean: bool,
}

/// Run `silo down`.
///
/// # Errors
///
/// Returns an error if there is no lockfile, a `pre-down` hook fails, the
/// dev loop cannot be signalled, or the cluster cannot be deleted.
pub async fn run(app: &AppContext, args: &DownArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    let host = app.host(&config.project_root);
    let reporter = app.reporter();
    let ctx = &app.output;

    let active = begin_down(&host, &reporter, &config).await?;

    if let Some(pid) = live_dev_loop(&host, &active).await {
        let message = format!("Stopping Tilt (pid {pid})");
        let pb = ctx.show_progress().then(|| progress::spinner(&message));
        if pb.is_none() {
            ctx.info(&message);
        }
        match (stop_dev_loop(&host, pid, StopPolicy::default()).await, pb) {
            (Ok(outcome), Some(pb)) => progress::finish_ok(&pb, stopped(outcome)),
            (Ok(outcome), None) => ctx.success(stopped(outcome)),
            (Err(err), pb) => {
                if let Some(pb) = pb {
                    progress::finish_error(&pb, "Failed to stop Tilt");
                }
                return Err(err);
            }
        }
    }

    finish_down(
        &host,
        &reporter,
        &active,
        DownOptions {
            delete_cluster: args.delete_cluster,
            clean: args.clean,
        },
    )
    .await?;
    ctx.success(&format!("Instance '{}' is down", active.state.name));
    Ok(ExitCode::SUCCESS)
}

fn stopped(outcome: StopOutcome) -> &'static str {
    match outcome {
        StopOutcome::Interrupted => "Stopped Tilt",
        StopOutcome::Terminated => "Stopped Tilt (terminated after grace period)",
    }
}
