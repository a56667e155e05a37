//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, OutputFlags};
use crate::commands;

/// Per-worktree local development environments on top of Tilt and k3d
#[derive(Parser)]
#[command(
    name = "silo",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true, default_value = "silo.toml")]
    pub config: PathBuf,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start environment (creates k3d if needed, starts Tilt)
    Up(commands::InstanceArgs),

    /// Prepare the environment and run `tilt ci`
    Ci(commands::ci::CiArgs),

    /// Stop environment (stops Tilt, keeps k3d by default)
    Down(commands::down::DownArgs),

    /// Show current instance state
    Status,

    /// Generate env file only, don't start anything
    Env(commands::InstanceArgs),

    /// List available profiles from the config file
    Profiles,

    /// Print silo version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            config,
            verbose,
            json,
            quiet,
            no_color,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
                verbose,
            },
            config,
        });

        match command {
            Command::Up(args) => commands::up::run(&app, &args).await,
            Command::Ci(args) => commands::ci::run(&app, &args).await,
            Command::Down(args) => commands::down::run(&app, &args).await,
            Command::Status => commands::status::run(&app).await,
            Command::Env(args) => commands::env::run(&app, &args).await,
            Command::Profiles => commands::profiles::run(&app),
            Command::Version => commands::version::run(&app),
        }
    }
}
