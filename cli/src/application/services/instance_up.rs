//! Bringing an instance up: config selection, port allocation, env and
//! lockfile materialization, cluster reconciliation and registry setup.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use silo_common::{InstanceState, OrderedMap, REGISTRY_PORT_KEY};

use crate::application::ports::{CommandRequest, InstanceHost, LocalFs, ProgressReporter};
use crate::application::retry::RetryPolicy;
use crate::application::services::cluster::{ClusterSpec, ensure_cluster, write_kubeconfig};
use crate::application::services::dev_loop::{DEV_LOOP_PROGRAM, ensure_not_running, supervise_dev_loop};
use crate::application::services::exec::{TILT_CI_TIMEOUT, run_checked};
use crate::application::services::hooks::{HookContext, run_hooks};
use crate::application::services::lockfile::{read_state, update_state, write_state};
use crate::application::services::port_allocator::{AllocationRequest, allocate_ports};
use crate::application::services::registry_advertise::advertise_registry;
use crate::application::services::registry_port::resolve_registry_port;
use crate::application::services::tools::{ensure_tools, required_tools};
use crate::domain::config::{HookPhase, ResolvedConfig};
use crate::domain::env::{child_env, render_env_file, render_github_env};
use crate::domain::error::ConfigError;
use crate::domain::identity::{identity_vars, resolve_hosts};
use crate::domain::instance::{DeriveParams, NameSource, derive_instance, resolve_instance_name};
use crate::domain::ports::{PortAllocationEvent, PortSource};
use crate::domain::profile::{LockedProfile, ProfileRequest, ProfileSource, apply_profile, select_profile};
use crate::domain::registry::{apply_registry_port_override, resolve_advertisement};

/// Caller choices for one `up`/`ci`/`env` invocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrepareOptions<'a> {
    /// Positional instance name.
    pub name: Option<&'a str>,
    /// `--profile`.
    pub profile: Option<&'a str>,
    /// `SILO_PROFILE`, read once at startup.
    pub profile_env: Option<&'a str>,
    /// `--force`: allow profile switches and ignore recorded ports.
    pub force: bool,
}

/// An instance whose env file and lockfile are on disk.
#[derive(Debug, Clone)]
pub struct PreparedInstance {
    /// Base config with the effective profile merged in.
    pub config: ResolvedConfig,
    pub state: InstanceState,
    pub urls: OrderedMap<String>,
    pub env_file: PathBuf,
    pub name_source: NameSource,
    pub events: Vec<PortAllocationEvent>,
    pub cluster_args: Vec<String>,
}

impl PreparedInstance {
    /// Instance values plus the `SILO_*` markers, for every spawned child.
    #[must_use]
    pub fn env(&self) -> OrderedMap<String> {
        child_env(&self.state, &self.urls, &self.env_file)
    }
}

/// Merge the effective profile into `base`.
///
/// # Errors
///
/// Returns a profile error when the selection is unknown or would switch
/// profiles without `force`, or a config error from the merge.
pub fn select_config(
    reporter: &impl ProgressReporter,
    base: &ResolvedConfig,
    recorded: Option<&InstanceState>,
    opts: &PrepareOptions<'_>,
) -> Result<(ResolvedConfig, Option<String>)> {
    let selection = select_profile(
        base.profiles.as_ref(),
        ProfileRequest {
            flag: opts.profile,
            env: opts.profile_env,
            lockfile: recorded.map(|s| LockedProfile(s.profile.as_deref())),
            force: opts.force,
        },
    )?;

    if selection.cleared {
        reporter.step("Cleared profile, using base config");
    }
    let Some(name) = selection.name else {
        return Ok((base.clone(), None));
    };
    if selection.source == ProfileSource::Lockfile {
        reporter.detail(&format!("Reusing profile '{name}' from lockfile"));
    }
    reporter.step(&format!("Profile: {name}"));
    let config = apply_profile(base, &name)?;
    Ok((config, Some(name)))
}

/// Report how each port was chosen. Falling back to the ephemeral range
/// because a declared default was busy is worth a warning.
pub fn report_port_events(reporter: &impl ProgressReporter, events: &[PortAllocationEvent]) {
    for event in events {
        match (event.source, event.requested_default.fixed()) {
            (PortSource::Ephemeral, Some(default)) => reporter.warn(&format!(
                "Port {} in use ({default}), allocated {}",
                event.key, event.assigned
            )),
            (source, _) => reporter.detail(&format!(
                "Port {}: {} ({source})",
                event.key, event.assigned
            )),
        }
    }
}

fn write_env_file(fs: &impl LocalFs, prepared: &PreparedInstance) -> Result<()> {
    fs.write(&prepared.env_file, &render_env_file(&prepared.state, &prepared.urls))
        .with_context(|| format!("writing {}", prepared.env_file.display()))
}

/// Resolve name, hosts and ports for `config`, then write the env file and
/// the lockfile.
///
/// When the lockfile already describes the same instance its creation
/// time, cluster flag and tracked dev loop are carried over.
///
/// # Errors
///
/// Returns a template, port or config error from derivation, or an I/O
/// error from either write.
pub async fn materialize(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    config: ResolvedConfig,
    profile: Option<String>,
    recorded: Option<&InstanceState>,
    opts: &PrepareOptions<'_>,
) -> Result<PreparedInstance> {
    let (name, name_source) = resolve_instance_name(
        opts.name,
        recorded.map(|s| s.name.as_str()),
        &config.project_root,
    );
    reporter.step(&format!("Resolved instance name: {name} ({name_source})"));

    let hosts = resolve_hosts(&config.hosts, &identity_vars(&name, &config.prefix))?;
    let allocation = allocate_ports(
        host,
        AllocationRequest {
            ports: &config.ports,
            recorded: recorded.map(|s| &s.ports),
            force: opts.force,
        },
    )
    .await?;
    report_port_events(reporter, &allocation.events);

    let same = recorded.filter(|s| s.name == name);
    let kube_dir = if config.k3d_enabled() {
        host.kube_dir()?
    } else {
        PathBuf::new()
    };
    let derived = derive_instance(DeriveParams {
        config: &config,
        name: &name,
        profile: profile.as_deref(),
        hosts: &hosts,
        ports: &allocation.ports,
        created_at: same.map_or_else(Utc::now, |s| s.created_at),
        kube_dir: &kube_dir,
    })?;

    let mut state = derived.state;
    if let Some(previous) = same {
        state.k3d_cluster_created = previous.k3d_cluster_created;
        state.tilt_pid = previous.tilt_pid;
        state.tilt_started_at = previous.tilt_started_at;
    }

    let prepared = PreparedInstance {
        env_file: config.env_file_path(),
        config,
        state,
        urls: derived.urls,
        name_source,
        events: allocation.events,
        cluster_args: derived.cluster_args,
    };
    write_env_file(host, &prepared)?;
    write_state(host, &prepared.state).await?;
    Ok(prepared)
}

/// Resolve and persist an instance without starting anything (`silo env`).
///
/// # Errors
///
/// See [`select_config`] and [`materialize`].
pub async fn resolve_instance(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    base: &ResolvedConfig,
    opts: &PrepareOptions<'_>,
) -> Result<PreparedInstance> {
    let recorded = read_state(host).await?;
    let (config, profile) = select_config(reporter, base, recorded.as_ref(), opts)?;
    materialize(host, reporter, config, profile, recorded.as_ref(), opts).await
}

/// Reconcile the k3d cluster, kubeconfig and registry port for `prepared`.
async fn reconcile_cluster(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    prepared: &mut PreparedInstance,
) -> Result<()> {
    let root = prepared.config.project_root.clone();
    let Some(cluster) = prepared.state.identity.k3d_cluster_name.clone() else {
        return Ok(());
    };
    let registry = prepared.state.identity.k3d_registry_name.clone();

    reporter.step(&format!("Ensuring k3d cluster '{cluster}'"));
    let created = ensure_cluster(
        host,
        reporter,
        ClusterSpec {
            name: &cluster,
            registry: registry.as_deref(),
            args: &prepared.cluster_args,
            cwd: &root,
        },
    )
    .await?;
    prepared.state.k3d_cluster_created = true;

    if let Some(kubeconfig) = prepared.state.identity.kubeconfig_path.clone() {
        reporter.detail(&format!("Writing kubeconfig to {}", kubeconfig.display()));
        write_kubeconfig(host, host, &cluster, &kubeconfig, &root).await?;
    }

    if let (true, Some(registry)) = (prepared.config.k3d_registry_enabled(), registry) {
        let actual =
            resolve_registry_port(host, reporter, &registry, &root, RetryPolicy::REGISTRY_PORT)
                .await?;
        let reconciled = apply_registry_port_override(&prepared.config, &prepared.state, actual)?;
        if reconciled.changed {
            let requested = prepared
                .state
                .ports
                .get(REGISTRY_PORT_KEY)
                .copied()
                .unwrap_or_default();
            reporter.warn(&format!(
                "Registry port drift detected (requested {requested}, actual {actual}). Updating lockfile."
            ));
            prepared.state = reconciled.state;
            prepared.urls = reconciled.urls;
            write_env_file(host, prepared)?;
            write_state(host, &prepared.state).await?;
        }
    }

    update_state(host, |state| state.k3d_cluster_created = true).await?;
    if created {
        reporter.success(&format!("Created k3d cluster '{cluster}'"));
    } else {
        reporter.success(&format!("Reusing k3d cluster '{cluster}'"));
    }
    Ok(())
}

/// Everything `up` and `ci` do before handing over to the dev loop.
///
/// # Errors
///
/// Returns [`crate::domain::error::InstanceError`] when a dev loop already
/// runs, profile and config errors, [`crate::domain::error::CommandError`]
/// for missing tools and failing hooks or backend commands, and registry
/// errors from port reconciliation or advertisement.
pub async fn prepare_instance(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    base: &ResolvedConfig,
    opts: &PrepareOptions<'_>,
) -> Result<PreparedInstance> {
    reporter.detail(&format!("Config path: {}", base.config_path.display()));
    let recorded = read_state(host).await?;
    ensure_not_running(host, recorded.as_ref(), &base.project_root).await?;

    let (config, profile) = select_config(reporter, base, recorded.as_ref(), opts)?;

    let tools = required_tools(&config);
    reporter.step(&format!("Validating tools: {}", tools.join(", ")));
    ensure_tools(host, &tools).await?;

    let mut prepared = materialize(host, reporter, config, profile, recorded.as_ref(), opts).await?;
    let root = prepared.config.project_root.clone();

    let env = prepared.env();
    let pre_up = prepared.config.hooks.get(HookPhase::PreUp);
    run_hooks(host, reporter, HookPhase::PreUp, pre_up, HookContext { cwd: &root, env: &env })
        .await?;

    if prepared.config.k3d_enabled() {
        reconcile_cluster(host, reporter, &mut prepared).await?;
    }

    if let Some(advert) = resolve_advertisement(&prepared.config, &prepared.state, &prepared.urls)? {
        advertise_registry(
            host,
            host,
            reporter,
            &advert,
            &root,
            RetryPolicy::REGISTRY_ADVERTISE,
        )
        .await?;
    }

    let env = prepared.env();
    let post_up = prepared.config.hooks.get(HookPhase::PostUp);
    run_hooks(host, reporter, HookPhase::PostUp, post_up, HookContext { cwd: &root, env: &env })
        .await?;

    Ok(prepared)
}

// ── Dev loop ──────────────────────────────────────────────────────────────────

/// `silo ci` flags.
#[derive(Debug, Clone, Default)]
pub struct CiOptions {
    /// Passed to `tilt ci --timeout`.
    pub timeout: Option<String>,
    /// Append the instance env to `$GITHUB_ENV`.
    pub export: bool,
    /// Extra arguments after `--`.
    pub tilt_args: Vec<String>,
}

/// Start `tilt up` for `prepared` and supervise it until it exits.
///
/// # Errors
///
/// Returns an error if the dev loop cannot be spawned or tracked.
pub async fn run_dev_loop(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    prepared: &PreparedInstance,
) -> Result<Option<i32>> {
    let request = CommandRequest::new(DEV_LOOP_PROGRAM, ["up"])
        .cwd(&prepared.config.project_root)
        .envs(&prepared.env())
        .inherit();
    reporter.step("Starting Tilt");
    supervise_dev_loop(host, host, host, &request).await
}

/// Append the instance env vars to the GitHub Actions env file.
///
/// # Errors
///
/// Returns [`ConfigError::GithubEnvMissing`] when no path is known, or an
/// error if the file cannot be appended to.
pub fn export_github_env(
    fs: &impl LocalFs,
    prepared: &PreparedInstance,
    github_env: Option<&Path>,
) -> Result<()> {
    let path = github_env.ok_or(ConfigError::GithubEnvMissing)?;
    fs.append(path, &render_github_env(&prepared.state, &prepared.urls))
        .with_context(|| format!("appending to {}", path.display()))
}

/// Run `tilt ci` for `prepared`, exporting to `$GITHUB_ENV` first when asked.
///
/// # Errors
///
/// Returns [`ConfigError::GithubEnvMissing`] when exporting without a
/// path, and `CommandError::Failed`/`Timeout` when `tilt ci` fails.
pub async fn run_ci(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    prepared: &PreparedInstance,
    opts: &CiOptions,
    github_env: Option<&Path>,
) -> Result<()> {
    if opts.export {
        export_github_env(host, prepared, github_env)?;
        reporter.detail("Exported env vars to GITHUB_ENV");
    }

    let mut args = vec!["ci".to_string()];
    if let Some(timeout) = &opts.timeout {
        args.push("--timeout".to_string());
        args.push(timeout.clone());
    }
    args.extend(opts.tilt_args.iter().cloned());
    let request = CommandRequest::new(DEV_LOOP_PROGRAM, args)
        .cwd(&prepared.config.project_root)
        .envs(&prepared.env())
        .timeout(TILT_CI_TIMEOUT)
        .inherit()
        .context("tilt ci");

    reporter.step("Running tilt ci");
    run_checked(host, &request).await?;
    reporter.success("tilt ci passed");
    Ok(())
}
