//! `silo profiles`: list declared profiles.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::output::json;

/// Run `silo profiles`.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded.
pub fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.load_config()?;
    let ctx = &app.output;
    ctx.detail(&format!("Config path: {}", config.config_path.display()));
    let names = config.profile_names();

    if app.is_json() {
        json::print(&serde_json::json!({ "profiles": names }))?;
        return Ok(ExitCode::SUCCESS);
    }

    if names.is_empty() {
        ctx.info("No profiles defined");
        return Ok(ExitCode::SUCCESS);
    }
    ctx.header("Available profiles:");
    for name in names {
        println!("    {name}");
    }
    Ok(ExitCode::SUCCESS)
}
