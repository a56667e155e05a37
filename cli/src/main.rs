//! silo - per-worktree local development environments

use std::process::ExitCode;

use clap::Parser;
use silo_cli::cli::Cli;
use silo_cli::domain::error::error_code;
use silo_cli::output::json;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let as_json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(err) => {
            let code = error_code(&err).unwrap_or("UNKNOWN");
            let message = format!("{err:#}");
            match (as_json, json::format_error(&message, code)) {
                (true, Ok(out)) => println!("{out}"),
                _ => eprintln!("Error [{code}]: {message}"),
            }
            ExitCode::FAILURE
        }
    }
}
