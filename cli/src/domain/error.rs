//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator. Every variant carries a stable machine-readable code
//! recoverable from an `anyhow::Error` chain with [`error_code`].

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Stable machine-readable error code.
pub trait ErrorCode {
    fn code(&self) -> &'static str;
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while loading or validating `silo.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("{0}")]
    Invalid(String),

    #[error("GITHUB_ENV is not set; cannot export env vars for CI")]
    GithubEnvMissing,
}

impl ErrorCode for ConfigError {
    fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "CONFIG_NOT_FOUND",
            Self::Invalid(_) => "INVALID_CONFIG",
            Self::GithubEnvMissing => "GITHUB_ENV_MISSING",
        }
    }
}

// ── Template errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Unknown template variable '{name}' in \"{template}\"")]
    UnknownVariable { name: String, template: String },
}

impl ErrorCode for TemplateError {
    fn code(&self) -> &'static str {
        "INVALID_TEMPLATE"
    }
}

// ── Port errors ───────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PortError {
    #[error("Invalid port for {key}: {value}")]
    Invalid { key: String, value: String },

    #[error("No free ports available in ephemeral range")]
    Exhausted,
}

impl ErrorCode for PortError {
    fn code(&self) -> &'static str {
        match self {
            Self::Invalid { .. } => "INVALID_PORT",
            Self::Exhausted => "PORTS_EXHAUSTED",
        }
    }
}

// ── Lockfile errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LockfileError {
    #[error("No lockfile found. Run 'silo up' first.")]
    Missing,

    #[error("Lockfile {} is invalid: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
}

impl ErrorCode for LockfileError {
    fn code(&self) -> &'static str {
        match self {
            Self::Missing => "LOCKFILE_MISSING",
            Self::Invalid { .. } => "INVALID_LOCKFILE",
        }
    }
}

// ── Profile errors ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("No profiles defined in config (requested '{0}')")]
    NoneDeclared(String),

    #[error("Unknown profile: {0}")]
    NotFound(String),

    #[error("Profile change requires --force (current: {current}, requested: {requested})")]
    SwitchRequiresForce { current: String, requested: String },
}

impl ErrorCode for ProfileError {
    fn code(&self) -> &'static str {
        match self {
            Self::NoneDeclared(_) => "PROFILE_MISSING",
            Self::NotFound(_) => "PROFILE_NOT_FOUND",
            Self::SwitchRequiresForce { .. } => "PROFILE_SWITCH",
        }
    }
}

// ── Instance / process errors ─────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("Instance '{0}' already running. Use 'silo down' first.")]
    AlreadyRunning(String),

    #[error("Tilt already running outside silo (pid {}). Stop it first.", join_pids(.0))]
    ForeignDevLoop(Vec<u32>),

    /// A derived field that must exist at this point does not.
    #[error("Invalid instance state: {0}")]
    InvalidState(String),
}

impl ErrorCode for InstanceError {
    fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning(_) => "ALREADY_RUNNING",
            Self::ForeignDevLoop(_) => "TILT_RUNNING",
            Self::InvalidState(_) => "INVALID_STATE",
        }
    }
}

fn join_pids(pids: &[u32]) -> String {
    pids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Registry errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registry container not found for '{0}'")]
    ContainerMissing(String),

    #[error("Multiple registry containers matched '{host}': {}", .candidates.join(", "))]
    ContainerAmbiguous {
        host: String,
        candidates: Vec<String>,
    },

    #[error("Failed to list docker containers for registry '{0}'")]
    ContainerListFailed(String),

    #[error("Failed to resolve registry port for '{0}'")]
    PortFailed(String),

    #[error("Unable to parse registry port for '{0}'")]
    PortInvalid(String),
}

impl ErrorCode for RegistryError {
    fn code(&self) -> &'static str {
        match self {
            Self::ContainerMissing(_) => "REGISTRY_CONTAINER_MISSING",
            Self::ContainerAmbiguous { .. } => "REGISTRY_CONTAINER_AMBIGUOUS",
            Self::ContainerListFailed(_) => "REGISTRY_CONTAINER_LIST_FAILED",
            Self::PortFailed(_) => "REGISTRY_PORT_FAILED",
            Self::PortInvalid(_) => "REGISTRY_PORT_INVALID",
        }
    }
}

// ── External command errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command failed ({code}): {context}")]
    Failed { context: String, code: i32 },

    #[error("{context} timed out after {after:?}")]
    Timeout { context: String, after: Duration },

    #[error("Missing required tools: {}", .0.join(", "))]
    MissingTools(Vec<String>),

    #[error("Failed to fetch kubeconfig for cluster '{0}'")]
    Kubeconfig(String),
}

impl ErrorCode for CommandError {
    fn code(&self) -> &'static str {
        match self {
            Self::Failed { .. } => "COMMAND_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::MissingTools(_) => "MISSING_TOOL",
            Self::Kubeconfig(_) => "KUBECONFIG_FAILED",
        }
    }
}

// ── Code lookup ───────────────────────────────────────────────────────────────

fn code_of(cause: &(dyn std::error::Error + 'static)) -> Option<&'static str> {
    if let Some(e) = cause.downcast_ref::<ConfigError>() {
        return Some(e.code());
    }
    if let Some(e) = cause.downcast_ref::<TemplateError>() {
        return Some(e.code());
    }
    if let Some(e) = cause.downcast_ref::<PortError>() {
        return Some(e.code());
    }
    if let Some(e) = cause.downcast_ref::<LockfileError>() {
        return Some(e.code());
    }
    if let Some(e) = cause.downcast_ref::<ProfileError>() {
        return Some(e.code());
    }
    if let Some(e) = cause.downcast_ref::<InstanceError>() {
        return Some(e.code());
    }
    if let Some(e) = cause.downcast_ref::<RegistryError>() {
        return Some(e.code());
    }
    cause.downcast_ref::<CommandError>().map(ErrorCode::code)
}

/// Find the first domain error code in an error chain, outermost first.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> Option<&'static str> {
    err.chain().find_map(code_of)
}
