//! Profile selection and overlay merge.
//!
//! A profile is chosen from, in priority order, the `--profile` flag, the
//! `SILO_PROFILE` environment value, and the profile pinned in the lockfile.
//! Once an instance exists its profile only changes with `--force`.

use anyhow::Result;
use silo_common::OrderedMap;

use crate::domain::config::{K3dConfig, ProfileConfig, ResolvedConfig};
use crate::domain::error::{ConfigError, ProfileError};

/// Where the effective profile name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    Flag,
    Env,
    Lockfile,
    None,
}

/// Inputs to profile selection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProfileRequest<'a> {
    pub flag: Option<&'a str>,
    pub env: Option<&'a str>,
    /// `None` when no lockfile exists.
    pub lockfile: Option<LockedProfile<'a>>,
    pub force: bool,
}

/// The profile recorded in an existing lockfile (`None` = base config).
#[derive(Debug, Clone, Copy)]
pub struct LockedProfile<'a>(pub Option<&'a str>);

/// Outcome of profile selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSelection {
    pub name: Option<String>,
    pub source: ProfileSource,
    /// The lockfile had a profile and `--force` dropped it.
    pub cleared: bool,
}

fn normalize(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Pick the effective profile name and validate it against `profiles`.
///
/// # Errors
///
/// Returns [`ProfileError::NoneDeclared`] when a name is requested but no
/// profiles exist, or [`ProfileError::NotFound`] for an unknown name.
pub fn resolve_profile_name(
    flag: Option<&str>,
    env: Option<&str>,
    lockfile: Option<&str>,
    profiles: Option<&OrderedMap<ProfileConfig>>,
) -> Result<(Option<String>, ProfileSource), ProfileError> {
    let (name, source) = if let Some(name) = normalize(flag) {
        (name, ProfileSource::Flag)
    } else if let Some(name) = normalize(env) {
        (name, ProfileSource::Env)
    } else if let Some(name) = normalize(lockfile) {
        (name, ProfileSource::Lockfile)
    } else {
        return Ok((None, ProfileSource::None));
    };

    match profiles {
        Some(declared) if !declared.is_empty() => {
            if declared.contains_key(name) {
                Ok((Some(name.to_string()), source))
            } else {
                Err(ProfileError::NotFound(name.to_string()))
            }
        }
        _ => Err(ProfileError::NoneDeclared(name.to_string())),
    }
}

/// Resolve the effective profile, enforcing the switch rule.
///
/// With `--force` and no explicit flag or environment value, the lockfile
/// profile is ignored, which returns the instance to the base config.
///
/// # Errors
///
/// Returns [`ProfileError::SwitchRequiresForce`] when a lockfile exists, the
/// effective profile differs from the recorded one, and `force` is unset.
pub fn select_profile(
    profiles: Option<&OrderedMap<ProfileConfig>>,
    request: ProfileRequest<'_>,
) -> Result<ProfileSelection, ProfileError> {
    let explicit = normalize(request.flag).or(normalize(request.env));
    let recorded = request.lockfile.and_then(|locked| normalize(locked.0));
    let for_resolution = if request.force && explicit.is_none() {
        None
    } else {
        recorded
    };

    let (name, source) = resolve_profile_name(request.flag, request.env, for_resolution, profiles)?;

    let mut cleared = false;
    if request.lockfile.is_some() && recorded != name.as_deref() {
        if !request.force {
            return Err(ProfileError::SwitchRequiresForce {
                current: recorded.unwrap_or("base").to_string(),
                requested: name.as_deref().unwrap_or("base").to_string(),
            });
        }
        cleared = recorded.is_some() && name.is_none();
    }

    Ok(ProfileSelection {
        name,
        source,
        cleared,
    })
}

/// Overlay values replace base values in place; new keys follow in overlay order.
fn merge_record<V: Clone>(base: &OrderedMap<V>, overlay: Option<&OrderedMap<V>>) -> OrderedMap<V> {
    let mut merged = base.clone();
    if let Some(overlay) = overlay {
        for (key, value) in overlay.iter() {
            merged.insert(key, value.clone());
        }
    }
    merged
}

fn merge_k3d(base: Option<&K3dConfig>, profile: &ProfileConfig) -> Result<Option<K3dConfig>> {
    let overlay = profile.k3d.as_ref();
    if base.is_none() && overlay.is_none() {
        return Ok(None);
    }

    let enabled = overlay
        .and_then(|o| o.enabled)
        .or(base.map(|b| b.enabled))
        .ok_or_else(|| {
            ConfigError::Invalid("k3d.enabled must be defined when using profiles".into())
        })?;

    let base_registry = base.and_then(|b| b.registry.as_ref());
    let registry = match (base_registry, overlay.and_then(|o| o.registry.as_ref())) {
        (Some(b), Some(o)) => Some(b.merged(o)),
        (None, Some(o)) => Some(o.clone()),
        (b, None) => b.cloned(),
    };

    let mut args = overlay
        .and_then(|o| o.args.clone())
        .or_else(|| base.and_then(|b| b.args.clone()));
    if let Some(extra) = profile
        .append
        .as_ref()
        .and_then(|a| a.k3d.as_ref())
        .and_then(|k| k.args.as_ref())
    {
        args.get_or_insert_with(Vec::new).extend(extra.iter().cloned());
    }

    Ok(Some(K3dConfig {
        enabled,
        args,
        registry,
    }))
}

/// Merge the named profile into `config`.
///
/// # Errors
///
/// Returns [`ProfileError::NotFound`] for an unknown profile, a port error
/// for invalid overlay ports, or [`ConfigError::Invalid`] when neither side
/// defines `k3d.enabled`.
pub fn apply_profile(config: &ResolvedConfig, name: &str) -> Result<ResolvedConfig> {
    let profile = config
        .profiles
        .as_ref()
        .and_then(|p| p.get(name))
        .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

    let overlay_ports = profile.port_specs()?;
    let append_hooks = profile.append.as_ref().and_then(|a| a.hooks.as_ref());

    Ok(ResolvedConfig {
        ports: merge_record(&config.ports, overlay_ports.as_ref()),
        hosts: merge_record(&config.hosts, profile.hosts.as_ref()),
        urls: merge_record(&config.urls, profile.urls.as_ref()),
        hooks: config.hooks.merged(profile.hooks.as_ref(), append_hooks),
        k3d: merge_k3d(config.k3d.as_ref(), profile)?,
        ..config.clone()
    })
}
