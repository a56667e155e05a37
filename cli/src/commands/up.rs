//! `silo up`: prepare the instance and supervise `tilt up`.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::instance_up::{prepare_instance, run_dev_loop};
use crate::commands::env::print_endpoints;

/// Map a child exit code onto ours. Signals and out-of-range codes fail.
pub(crate) fn exit_code(code: Option<i32>) -> ExitCode {
    match code.map(u8::try_from) {
        Some(Ok(0)) => ExitCode::SUCCESS,
        Some(Ok(code)) => ExitCode::from(code),
        _ => ExitCode::FAILURE,
    }
}

/// Run `silo up`.
///
/// # Errors
///
/// Returns an error if preparation fails or the dev loop cannot be started.
pub async fn run(app: &AppContext, args: &super::InstanceArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    let host = app.host(&config.project_root);
    let reporter = app.reporter();

    let prepared = prepare_instance(&host, &reporter, &config, &args.options(app)).await?;
    app.output.success(&format!(
        "Instance '{}' ready ({})",
        prepared.state.name,
        prepared.env_file.display()
    ));
    print_endpoints(&app.output, &prepared);

    let code = run_dev_loop(&host, &reporter, &prepared).await?;
    Ok(exit_code(code))
}
