//! Dev-loop (Tilt) process tracking, supervision and shutdown.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use silo_common::InstanceState;

use crate::application::ports::{
    CommandRequest, CommandRunner, LockfileStore, ProcessControl, StopSignal,
};
use crate::application::services::lockfile::update_state;
use crate::domain::error::{InstanceError, LockfileError};

/// Executable supervised as the dev loop.
pub const DEV_LOOP_PROGRAM: &str = "tilt";

/// How long a stop waits for an interrupted dev loop before escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopPolicy {
    pub grace: Duration,
    pub poll: Duration,
}

impl Default for StopPolicy {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(10),
            poll: Duration::from_millis(200),
        }
    }
}

/// How a stop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Exited after SIGINT.
    Interrupted,
    /// Still alive after the grace period; SIGTERM was sent.
    Terminated,
}

/// `pid` exists and is a dev-loop process, not a recycled pid.
pub async fn is_dev_loop_alive(process: &impl ProcessControl, pid: u32) -> bool {
    if !process.is_alive(pid) {
        return false;
    }
    process
        .command_name(pid)
        .await
        .is_some_and(|name| name.contains(DEV_LOOP_PROGRAM))
}

/// Dev loops rooted at `project_root` other than the tracked one.
pub async fn find_foreign_dev_loops(
    process: &impl ProcessControl,
    project_root: &Path,
    tracked: Option<u32>,
) -> Vec<u32> {
    let pattern = format!("{DEV_LOOP_PROGRAM}.*{}", project_root.display());
    let own = std::process::id();
    process
        .find_pids(&pattern)
        .await
        .into_iter()
        .filter(|pid| Some(*pid) != tracked && *pid != own)
        .collect()
}

/// Refuse to start a second dev loop for the same project.
///
/// # Errors
///
/// Returns [`InstanceError::AlreadyRunning`] when the tracked pid is a live
/// dev loop and [`InstanceError::ForeignDevLoop`] when an untracked one runs
/// in the project root.
pub async fn ensure_not_running(
    process: &impl ProcessControl,
    recorded: Option<&InstanceState>,
    project_root: &Path,
) -> Result<()> {
    let tracked = recorded.and_then(|s| s.tilt_pid);
    if let (Some(state), Some(pid)) = (recorded, tracked) {
        if is_dev_loop_alive(process, pid).await {
            return Err(InstanceError::AlreadyRunning(state.name.clone()).into());
        }
    }
    let foreign = find_foreign_dev_loops(process, project_root, tracked).await;
    if !foreign.is_empty() {
        return Err(InstanceError::ForeignDevLoop(foreign).into());
    }
    Ok(())
}

/// Interrupt `pid`, wait up to the grace period, then terminate it.
///
/// # Errors
///
/// Returns an error if a signal cannot be delivered.
pub async fn stop_dev_loop(
    process: &impl ProcessControl,
    pid: u32,
    policy: StopPolicy,
) -> Result<StopOutcome> {
    process.signal(pid, StopSignal::Interrupt)?;
    let mut waited = Duration::ZERO;
    while waited < policy.grace {
        tokio::time::sleep(policy.poll).await;
        waited += policy.poll;
        if !process.is_alive(pid) {
            return Ok(StopOutcome::Interrupted);
        }
    }
    process.signal(pid, StopSignal::Terminate)?;
    Ok(StopOutcome::Terminated)
}

/// Clear the tracked pid if it is still `pid`. A removed lockfile is fine.
async fn release(store: &impl LockfileStore, pid: u32) -> Result<()> {
    let cleared = update_state(store, |state| {
        if state.tilt_pid == Some(pid) {
            state.clear_process();
        }
    })
    .await;
    match cleared {
        Ok(_) => Ok(()),
        Err(err) if matches!(err.downcast_ref::<LockfileError>(), Some(LockfileError::Missing)) => {
            Ok(())
        }
        Err(err) => Err(err),
    }
}

/// Spawn the dev loop, record it in the lockfile, and wait for it while
/// forwarding SIGINT/SIGTERM. The record is cleared once the child exits.
///
/// Returns the child's exit code (`None` when killed by a signal).
///
/// # Errors
///
/// Returns an error if the child cannot be spawned or the lockfile cannot
/// be updated.
pub async fn supervise_dev_loop(
    runner: &impl CommandRunner,
    process: &impl ProcessControl,
    store: &impl LockfileStore,
    request: &CommandRequest,
) -> Result<Option<i32>> {
    let mut child = runner.spawn(request)?;
    let pid = child
        .id()
        .context("dev loop exited before reporting a pid")?;
    if let Err(err) = update_state(store, |state| state.track_process(pid, Utc::now())).await {
        // An unrecorded child is unreachable by `down`.
        let _ = child.start_kill();
        let _ = child.wait().await;
        return Err(err);
    }

    let exit = process.wait_forwarding_signals(&mut child).await;
    release(store, pid).await?;
    exit
}
