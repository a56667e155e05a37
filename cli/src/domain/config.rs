//! Domain types and validators for `silo.toml`.
//!
//! Pure functions only: no I/O, no async, no filesystem access. The file is
//! deserialized into [`ConfigFile`] by the infra layer and turned into an
//! immutable [`ResolvedConfig`] here.

use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use silo_common::OrderedMap;

use crate::domain::error::{ConfigError, PortError};

// ── Constants ────────────────────────────────────────────────────────────────

pub const CONFIG_VERSION: u32 = 1;
pub const DEFAULT_CONFIG_FILE: &str = "silo.toml";
pub const DEFAULT_PREFIX: &str = "localnet";
pub const DEFAULT_OUTPUT: &str = ".localnet.env";
pub const APP_HOST_KEY: &str = "APP_HOST";
pub const TILT_HOST_KEY: &str = "TILT_HOST";
pub const DEFAULT_APP_HOST: &str = "${name}.localhost";
pub const RANDOM_PORT: &str = "random";

// ── Ports ────────────────────────────────────────────────────────────────────

/// A port as written in the file: a number or a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PortDecl {
    Number(i64),
    Keyword(String),
}

/// A validated port declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortSpec {
    Fixed(u16),
    /// Take whatever the ephemeral range offers. `0` is an alias.
    Random,
}

impl PortSpec {
    /// Validate a declared port for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Invalid`] for negative, out-of-range or
    /// unrecognised values.
    pub fn parse(key: &str, decl: &PortDecl) -> Result<Self, PortError> {
        let invalid = |value: String| PortError::Invalid {
            key: key.to_string(),
            value,
        };
        match decl {
            PortDecl::Number(0) => Ok(Self::Random),
            PortDecl::Number(n) => u16::try_from(*n)
                .map(Self::Fixed)
                .map_err(|_| invalid(n.to_string())),
            PortDecl::Keyword(word) if word.trim().eq_ignore_ascii_case(RANDOM_PORT) => {
                Ok(Self::Random)
            }
            PortDecl::Keyword(word) => Err(invalid(format!("\"{word}\""))),
        }
    }

    #[must_use]
    pub fn fixed(self) -> Option<u16> {
        match self {
            Self::Fixed(port) => Some(port),
            Self::Random => None,
        }
    }
}

impl std::fmt::Display for PortSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(port) => write!(f, "{port}"),
            Self::Random => f.write_str(RANDOM_PORT),
        }
    }
}

fn parse_ports(decls: &OrderedMap<PortDecl>) -> Result<OrderedMap<PortSpec>, PortError> {
    let mut ports = OrderedMap::new();
    for (key, decl) in decls.iter() {
        ports.insert(key, PortSpec::parse(key, decl)?);
    }
    Ok(ports)
}

// ── Hooks ────────────────────────────────────────────────────────────────────

/// Lifecycle phase a hook list belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    PreUp,
    PostUp,
    PreDown,
    PostDown,
}

impl HookPhase {
    pub const ALL: [HookPhase; 4] = [
        HookPhase::PreUp,
        HookPhase::PostUp,
        HookPhase::PreDown,
        HookPhase::PostDown,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreUp => "pre-up",
            Self::PostUp => "post-up",
            Self::PreDown => "pre-down",
            Self::PostDown => "post-down",
        }
    }
}

/// Shell hooks keyed by phase. An absent phase means "no hooks".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleHooks {
    #[serde(rename = "pre-up", default)]
    pub pre_up: Option<Vec<String>>,
    #[serde(rename = "post-up", default)]
    pub post_up: Option<Vec<String>>,
    #[serde(rename = "pre-down", default)]
    pub pre_down: Option<Vec<String>>,
    #[serde(rename = "post-down", default)]
    pub post_down: Option<Vec<String>>,
}

impl LifecycleHooks {
    #[must_use]
    pub fn phase(&self, phase: HookPhase) -> Option<&Vec<String>> {
        match phase {
            HookPhase::PreUp => self.pre_up.as_ref(),
            HookPhase::PostUp => self.post_up.as_ref(),
            HookPhase::PreDown => self.pre_down.as_ref(),
            HookPhase::PostDown => self.post_down.as_ref(),
        }
    }

    /// Hooks for `phase`, empty when none are declared.
    #[must_use]
    pub fn get(&self, phase: HookPhase) -> &[String] {
        self.phase(phase).map(Vec::as_slice).unwrap_or_default()
    }

    fn phase_mut(&mut self, phase: HookPhase) -> &mut Option<Vec<String>> {
        match phase {
            HookPhase::PreUp => &mut self.pre_up,
            HookPhase::PostUp => &mut self.post_up,
            HookPhase::PreDown => &mut self.pre_down,
            HookPhase::PostDown => &mut self.post_down,
        }
    }

    /// Replace each phase the overlay declares, then concatenate appended hooks.
    #[must_use]
    pub fn merged(&self, overlay: Option<&Self>, append: Option<&Self>) -> Self {
        let mut merged = self.clone();
        for phase in HookPhase::ALL {
            if let Some(replacement) = overlay.and_then(|o| o.phase(phase)) {
                *merged.phase_mut(phase) = Some(replacement.clone());
            }
            let extra = append.map(|a| a.get(phase)).unwrap_or_default();
            if !extra.is_empty() {
                merged
                    .phase_mut(phase)
                    .get_or_insert_with(Vec::new)
                    .extend(extra.iter().cloned());
            }
        }
        merged
    }
}

// ── Registry settings ────────────────────────────────────────────────────────

/// `[k3d.registry]`: the registry k3d creates next to the cluster.
///
/// Every field is optional so profiles can override them one at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct K3dRegistryConfig {
    pub enabled: Option<bool>,
    /// `false` disables the `local-registry-hosting` ConfigMap.
    pub advertise: Option<bool>,
    pub host: Option<String>,
    pub host_from_container_runtime: Option<String>,
    pub host_from_cluster_network: Option<String>,
    pub help: Option<String>,
}

impl K3dRegistryConfig {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(false)
    }

    /// Field-wise overlay: overlay fields win when present.
    #[must_use]
    pub fn merged(&self, overlay: &Self) -> Self {
        Self {
            enabled: overlay.enabled.or(self.enabled),
            advertise: overlay.advertise.or(self.advertise),
            host: overlay.host.clone().or_else(|| self.host.clone()),
            host_from_container_runtime: overlay
                .host_from_container_runtime
                .clone()
                .or_else(|| self.host_from_container_runtime.clone()),
            host_from_cluster_network: overlay
                .host_from_cluster_network
                .clone()
                .or_else(|| self.host_from_cluster_network.clone()),
            help: overlay.help.clone().or_else(|| self.help.clone()),
        }
    }
}

/// Top-level `[registry]`: an external registry advertised to the cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct ExternalRegistryConfig {
    pub advertise: Option<bool>,
    pub host: Option<String>,
    pub host_from_container_runtime: Option<String>,
    pub host_from_cluster_network: Option<String>,
    pub help: Option<String>,
}

// ── k3d ──────────────────────────────────────────────────────────────────────

/// `[k3d]` in the base config.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct K3dConfig {
    pub enabled: bool,
    #[serde(default)]
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub registry: Option<K3dRegistryConfig>,
}

impl K3dConfig {
    #[must_use]
    pub fn registry_enabled(&self) -> bool {
        self.enabled && self.registry.as_ref().is_some_and(K3dRegistryConfig::is_enabled)
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        self.args.as_deref().unwrap_or(&[])
    }
}

/// `[profiles.<name>.k3d]`: every field optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileK3dConfig {
    pub enabled: Option<bool>,
    pub args: Option<Vec<String>>,
    pub registry: Option<K3dRegistryConfig>,
}

// ── Profiles ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileAppendK3d {
    pub args: Option<Vec<String>>,
}

/// `[profiles.<name>.append]`: concatenated instead of replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileAppend {
    pub hooks: Option<LifecycleHooks>,
    pub k3d: Option<ProfileAppendK3d>,
}

/// A named overlay on the base config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub ports: Option<OrderedMap<PortDecl>>,
    pub hosts: Option<OrderedMap<String>>,
    pub urls: Option<OrderedMap<String>>,
    pub k3d: Option<ProfileK3dConfig>,
    pub hooks: Option<LifecycleHooks>,
    pub append: Option<ProfileAppend>,
}

impl ProfileConfig {
    /// Validated overlay ports.
    ///
    /// # Errors
    ///
    /// Returns [`PortError::Invalid`] for an invalid declaration.
    pub fn port_specs(&self) -> Result<Option<OrderedMap<PortSpec>>, PortError> {
        self.ports.as_ref().map(parse_ports).transpose()
    }
}

// ── File schema ──────────────────────────────────────────────────────────────

/// `silo.toml` exactly as written.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub version: u32,
    pub prefix: Option<String>,
    pub output: Option<String>,
    pub ports: OrderedMap<PortDecl>,
    pub hosts: Option<OrderedMap<String>>,
    pub urls: Option<OrderedMap<String>>,
    pub k3d: Option<K3dConfig>,
    pub registry: Option<ExternalRegistryConfig>,
    pub hooks: Option<LifecycleHooks>,
    pub profiles: Option<OrderedMap<ProfileConfig>>,
}

// ── Resolved config ──────────────────────────────────────────────────────────

/// Immutable configuration for one invocation, after defaults and (later)
/// profile merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub prefix: String,
    /// Env file name, relative to the project root.
    pub output: String,
    pub ports: OrderedMap<PortSpec>,
    pub hosts: OrderedMap<String>,
    pub urls: OrderedMap<String>,
    pub k3d: Option<K3dConfig>,
    pub registry: Option<ExternalRegistryConfig>,
    pub hooks: LifecycleHooks,
    pub profiles: Option<OrderedMap<ProfileConfig>>,
    pub config_path: PathBuf,
    /// Directory containing the config file.
    pub project_root: PathBuf,
}

impl ResolvedConfig {
    /// Apply defaults and validate a parsed config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an unsupported version, an empty
    /// port table or missing `APP_HOST`, and [`PortError::Invalid`] for bad
    /// port declarations.
    pub fn from_file(file: ConfigFile, config_path: PathBuf) -> Result<Self> {
        if file.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {} (expected {CONFIG_VERSION})",
                file.version
            ))
            .into());
        }
        if file.ports.is_empty() {
            return Err(ConfigError::Invalid("ports must define at least one entry".into()).into());
        }
        let ports = parse_ports(&file.ports)?;

        let hosts = file
            .hosts
            .unwrap_or_else(|| [(APP_HOST_KEY, DEFAULT_APP_HOST.to_string())].into_iter().collect());
        ensure_app_host(&hosts)?;

        let project_root = config_path
            .parent()
            .map(PathBuf::from)
            .unwrap_or_default();

        Ok(Self {
            prefix: file.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            output: file.output.unwrap_or_else(|| DEFAULT_OUTPUT.to_string()),
            ports,
            hosts,
            urls: file.urls.unwrap_or_default(),
            k3d: file.k3d,
            registry: file.registry,
            hooks: file.hooks.unwrap_or_default(),
            profiles: file.profiles,
            config_path,
            project_root,
        })
    }

    #[must_use]
    pub fn k3d_enabled(&self) -> bool {
        self.k3d.as_ref().is_some_and(|k| k.enabled)
    }

    #[must_use]
    pub fn k3d_registry_enabled(&self) -> bool {
        self.k3d.as_ref().is_some_and(K3dConfig::registry_enabled)
    }

    /// Whether `up` will publish a `local-registry-hosting` ConfigMap.
    #[must_use]
    pub fn registry_advertise_enabled(&self) -> bool {
        let k3d = self.k3d_registry_enabled()
            && self
                .k3d
                .as_ref()
                .and_then(|k| k.registry.as_ref())
                .is_none_or(|r| r.advertise != Some(false));
        let external = self
            .registry
            .as_ref()
            .is_some_and(|r| r.advertise != Some(false));
        k3d || external
    }

    /// Declared profile names in file order.
    #[must_use]
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles
            .as_ref()
            .map(|p| p.keys().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn env_file_path(&self) -> PathBuf {
        self.project_root.join(&self.output)
    }
}

/// Hosts must define `APP_HOST`.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when it is missing or empty.
pub fn ensure_app_host(hosts: &OrderedMap<String>) -> Result<(), ConfigError> {
    match hosts.get(APP_HOST_KEY) {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ConfigError::Invalid("hosts must include APP_HOST".into())),
    }
}
