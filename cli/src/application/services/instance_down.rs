//! Tearing an instance down.
//!
//! Split in two halves around the dev-loop stop so the caller can show
//! progress while waiting for it.

use std::path::PathBuf;

use anyhow::Result;
use silo_common::{InstanceState, OrderedMap};

use crate::application::ports::{CommandRequest, InstanceHost, LocalFs, LockfileStore, ProgressReporter};
use crate::application::services::cluster::delete_cluster;
use crate::application::services::dev_loop::{DEV_LOOP_PROGRAM, is_dev_loop_alive};
use crate::application::services::exec::{TILT_DOWN_TIMEOUT, run_checked};
use crate::application::services::hooks::{HookContext, run_hooks, run_hooks_best_effort};
use crate::application::services::lockfile::{read_state, update_state};
use crate::application::services::tools::ensure_tools;
use crate::domain::config::{HookPhase, ResolvedConfig};
use crate::domain::env::child_env;
use crate::domain::error::LockfileError;
use crate::domain::instance::resolve_urls;
use crate::domain::profile::apply_profile;

/// `silo down` flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct DownOptions {
    pub delete_cluster: bool,
    /// Remove the env file and the lockfile afterwards.
    pub clean: bool,
}

/// The recorded instance with its profile applied.
#[derive(Debug, Clone)]
pub struct ActiveInstance {
    pub config: ResolvedConfig,
    pub state: InstanceState,
    pub urls: OrderedMap<String>,
    pub env_file: PathBuf,
}

impl ActiveInstance {
    #[must_use]
    pub fn env(&self) -> OrderedMap<String> {
        child_env(&self.state, &self.urls, &self.env_file)
    }
}

/// Load the lockfile instance and re-derive its config and urls.
///
/// # Errors
///
/// Returns [`LockfileError::Missing`] without a lockfile, and profile or
/// template errors when the recorded instance no longer fits the config.
pub async fn load_active(
    store: &impl LockfileStore,
    base: &ResolvedConfig,
) -> Result<ActiveInstance> {
    let Some(state) = read_state(store).await? else {
        return Err(LockfileError::Missing.into());
    };
    let config = match state.profile.as_deref() {
        Some(profile) => apply_profile(base, profile)?,
        None => base.clone(),
    };
    let urls = resolve_urls(&config, &state)?;
    Ok(ActiveInstance {
        env_file: config.env_file_path(),
        config,
        state,
        urls,
    })
}

/// Load the instance, run `pre-down` hooks and ask the dev loop to tear
/// down what it deployed. A failing `tilt down` only warns.
///
/// # Errors
///
/// Returns [`LockfileError::Missing`] without a lockfile, or the first
/// failing `pre-down` hook.
pub async fn begin_down(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    base: &ResolvedConfig,
) -> Result<ActiveInstance> {
    reporter.detail(&format!("Config path: {}", base.config_path.display()));
    let active = load_active(host, base).await?;
    let root = active.config.project_root.clone();
    let env = active.env();

    let pre_down = active.config.hooks.get(HookPhase::PreDown);
    run_hooks(host, reporter, HookPhase::PreDown, pre_down, HookContext { cwd: &root, env: &env })
        .await?;

    reporter.step("Running tilt down");
    let request = CommandRequest::new(DEV_LOOP_PROGRAM, ["down"])
        .cwd(&root)
        .envs(&env)
        .timeout(TILT_DOWN_TIMEOUT);
    let down = async {
        ensure_tools(host, &[DEV_LOOP_PROGRAM]).await?;
        run_checked(host, &request).await
    };
    if let Err(err) = down.await {
        reporter.warn(&format!("tilt down failed: {err:#}"));
    }
    Ok(active)
}

/// The tracked dev loop, if it is still running.
pub async fn live_dev_loop(host: &impl InstanceHost, active: &ActiveInstance) -> Option<u32> {
    match active.state.tilt_pid {
        Some(pid) if is_dev_loop_alive(host, pid).await => Some(pid),
        _ => None,
    }
}

/// Forget the dev loop, optionally delete the cluster, run `post-down`
/// hooks and optionally remove generated files.
///
/// # Errors
///
/// Returns an error if the lockfile cannot be updated, the cluster cannot
/// be deleted, or a generated file cannot be removed.
pub async fn finish_down(
    host: &impl InstanceHost,
    reporter: &impl ProgressReporter,
    active: &ActiveInstance,
    opts: DownOptions,
) -> Result<()> {
    let root = &active.config.project_root;

    if active.state.has_process_fields() {
        update_state(host, InstanceState::clear_process).await?;
    }

    if let (true, Some(cluster)) = (opts.delete_cluster, &active.state.identity.k3d_cluster_name) {
        reporter.step(&format!("Deleting k3d cluster '{cluster}'"));
        delete_cluster(host, cluster, root).await?;
        update_state(host, |state| state.k3d_cluster_created = false).await?;
        reporter.success(&format!("Deleted k3d cluster '{cluster}'"));
    }

    let env = active.env();
    let post_down = active.config.hooks.get(HookPhase::PostDown);
    run_hooks_best_effort(
        host,
        reporter,
        HookPhase::PostDown,
        post_down,
        HookContext { cwd: root, env: &env },
    )
    .await;

    if opts.clean {
        reporter.step("Removing env file and lockfile");
        LocalFs::remove_file(host, &active.env_file)?;
        LockfileStore::remove(host).await?;
    }
    Ok(())
}
