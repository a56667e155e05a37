//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and `silo_common`, never from
//! `crate::infra`, `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use silo_common::{Lockfile, OrderedMap};

use crate::domain::config::ResolvedConfig;

// ── Command Runner Port ───────────────────────────────────────────────────────

/// How a child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StdioMode {
    /// Capture stdout and stderr.
    #[default]
    Capture,
    /// Share the supervisor's terminal.
    Inherit,
}

/// One argv invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Added on top of the inherited environment.
    pub env: OrderedMap<String>,
    pub timeout: Option<Duration>,
    pub stdio: StdioMode,
    /// Human label used in error messages.
    pub context: String,
}

impl CommandRequest {
    #[must_use]
    pub fn new<I, S>(program: &str, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let args: Vec<String> = args.into_iter().map(Into::into).collect();
        let context = std::iter::once(program.to_string())
            .chain(args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            program: program.to_string(),
            args,
            cwd: None,
            env: OrderedMap::new(),
            timeout: None,
            stdio: StdioMode::Capture,
            context,
        }
    }

    /// `/bin/sh -c <script>`.
    #[must_use]
    pub fn shell(script: &str) -> Self {
        Self::new("/bin/sh", ["-c", script]).context(script)
    }

    #[must_use]
    pub fn cwd(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    #[must_use]
    pub fn envs(mut self, env: &OrderedMap<String>) -> Self {
        self.env.extend(env.iter().map(|(k, v)| (k, v.clone())));
        self
    }

    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key, value.to_string());
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn inherit(mut self) -> Self {
        self.stdio = StdioMode::Inherit;
        self
    }

    #[must_use]
    pub fn context(mut self, context: &str) -> Self {
        self.context = context.to_string();
        self
    }
}

/// What a finished child left behind. Streams are empty when inherited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the child was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code for error reporting; signals map to `-1`.
    #[must_use]
    pub fn code_or_signal(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned, or
    /// `CommandError::Timeout` if it outlives `request.timeout`. On timeout
    /// the child is killed, never left orphaned.
    async fn run(&self, request: &CommandRequest) -> Result<CommandOutput>;

    /// Spawn a long-running program without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned.
    fn spawn(&self, request: &CommandRequest) -> Result<tokio::process::Child>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait, no async needed.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
    /// Emit a message only shown with `--verbose`.
    fn detail(&self, message: &str);
}

// ── State and Filesystem Ports ────────────────────────────────────────────────

/// Persistence of the project lockfile.
#[allow(async_fn_in_trait)]
pub trait LockfileStore {
    /// Load the lockfile, returning `None` if it does not exist.
    async fn read(&self) -> Result<Option<Lockfile>>;
    /// Atomically replace the lockfile.
    async fn write(&self, lockfile: &Lockfile) -> Result<()>;
    /// Delete the lockfile if present.
    async fn remove(&self) -> Result<()>;
    /// Where the lockfile lives.
    fn path(&self) -> &Path;
}

/// Loads and validates `silo.toml`.
pub trait ConfigStore {
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when the file does not exist and
    /// `ConfigError::Invalid` when it does not parse or validate.
    fn load(&self, path: &Path) -> Result<ResolvedConfig>;
}

/// Raw filesystem operations.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    /// Write a file, creating parent directories.
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    fn append(&self, path: &Path, content: &str) -> Result<()>;
    /// Remove a file; a missing file is not an error.
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// A private directory deleted when the guard drops.
    fn scratch_dir(&self, prefix: &str) -> Result<tempfile::TempDir>;
}

/// Well-known locations outside the project.
pub trait LocalPaths {
    /// Directory instance kubeconfigs are written to.
    fn kube_dir(&self) -> Result<PathBuf>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Answers whether a TCP port can currently be bound.
#[allow(async_fn_in_trait)]
pub trait PortProbe {
    /// `false` on bind failure or probe timeout.
    async fn is_free(&self, port: u16) -> bool;
}

// ── Process Control Port ──────────────────────────────────────────────────────

/// Signals the supervisor sends to the dev loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

/// OS process inspection and signalling.
#[allow(async_fn_in_trait)]
pub trait ProcessControl {
    /// Whether `pid` exists (signal 0).
    fn is_alive(&self, pid: u32) -> bool;
    /// Executable name of `pid`, if it can be determined.
    async fn command_name(&self, pid: u32) -> Option<String>;
    /// Pids whose full command line matches `pattern`.
    async fn find_pids(&self, pattern: &str) -> Vec<u32>;
    /// Deliver a signal. Delivery to an already-gone pid is not an error.
    fn signal(&self, pid: u32, signal: StopSignal) -> Result<()>;
    /// Wait for `child`, forwarding SIGINT/SIGTERM received meanwhile.
    async fn wait_forwarding_signals(
        &self,
        child: &mut tokio::process::Child,
    ) -> Result<Option<i32>>;
}

// ── Composite ─────────────────────────────────────────────────────────────────

/// Everything an instance lifecycle touches outside the process.
pub trait InstanceHost:
    CommandRunner + PortProbe + LockfileStore + LocalFs + LocalPaths + ProcessControl
{
}

/// Blanket implementation: any type implementing all the ports is an `InstanceHost`.
impl<T> InstanceHost for T where
    T: CommandRunner + PortProbe + LockfileStore + LocalFs + LocalPaths + ProcessControl
{
}
