//! Application context: unified state passed to every command handler.
//!
//! `AppContext` carries the output context, the config path and the
//! environment variables read once at startup. Handlers never consult the
//! process environment themselves.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::config::ResolvedConfig;
use crate::domain::env::is_truthy;
use crate::infra::config::TomlConfigStore;
use crate::infra::host::SystemHost;
use crate::output::{OutputContext, TerminalReporter};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
    /// Show detail lines.
    pub verbose: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// `--config`, as given on the command line.
    pub config: PathBuf,
}

/// Process environment relevant to silo, captured once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    /// `SILO_PROFILE`.
    pub profile: Option<String>,
    /// `CI` or `GITHUB_ACTIONS` is truthy.
    pub ci: bool,
    /// `GITHUB_ENV`.
    pub github_env: Option<PathBuf>,
}

impl EnvSnapshot {
    /// Read the snapshot from the current process environment.
    #[must_use]
    pub fn from_process() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            profile: var("SILO_PROFILE"),
            ci: is_truthy(var("CI").as_deref()) || is_truthy(var("GITHUB_ACTIONS").as_deref()),
            github_env: var("GITHUB_ENV").map(PathBuf::from),
        }
    }
}

/// Unified application context passed to every command handler.
///
/// Constructed once in `Cli::run()` and passed as `&AppContext` to all
/// command handlers.
pub struct AppContext {
    /// Terminal output context (colors, quiet, verbose).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// `--config` path.
    pub config_path: PathBuf,
    /// Environment captured at startup.
    pub env: EnvSnapshot,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// JSON mode silences progress output so stdout carries only JSON.
    #[must_use]
    pub fn new(flags: &AppFlags) -> Self {
        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        Self {
            output: OutputContext::new(
                flags.output.no_color,
                flags.output.quiet || flags.output.json,
                flags.output.verbose,
            ),
            mode,
            config_path: flags.config.clone(),
            env: EnvSnapshot::from_process(),
        }
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Progress reporter writing to the terminal.
    #[must_use]
    pub fn reporter(&self) -> TerminalReporter<'_> {
        TerminalReporter::new(&self.output)
    }

    /// Load and validate the config file named by `--config`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` or `ConfigError::Invalid`.
    pub fn load_config(&self) -> Result<ResolvedConfig> {
        TomlConfigStore.load(&self.config_path)
    }

    /// Production host rooted at `project_root`.
    #[must_use]
    pub fn host(&self, project_root: &Path) -> SystemHost {
        SystemHost::new(project_root)
    }
}
