//! Lifecycle hook execution.
//!
//! Each hook runs as `/bin/sh -c <hook>` in the project root with the
//! instance environment and the terminal attached.

use std::path::Path;

use anyhow::{Context, Result};
use silo_common::OrderedMap;

use crate::application::ports::{CommandRequest, CommandRunner, ProgressReporter};
use crate::application::services::exec::{HOOK_TIMEOUT, run_checked};
use crate::domain::config::HookPhase;

/// Where and with what environment hooks run.
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub cwd: &'a Path,
    pub env: &'a OrderedMap<String>,
}

/// Run `hooks` in order, stopping at the first failure.
///
/// # Errors
///
/// Returns `CommandError::Failed` (with the phase in its context) for the
/// first hook that exits non-zero, or `CommandError::Timeout`.
pub async fn run_hooks(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    phase: HookPhase,
    hooks: &[String],
    ctx: HookContext<'_>,
) -> Result<()> {
    if hooks.is_empty() {
        return Ok(());
    }
    reporter.step(&format!("running {} hooks ({})", phase.as_str(), hooks.len()));
    for hook in hooks {
        reporter.detail(&format!("{}: {hook}", phase.as_str()));
        let request = CommandRequest::shell(hook)
            .cwd(ctx.cwd)
            .envs(ctx.env)
            .timeout(HOOK_TIMEOUT)
            .inherit()
            .context(&format!("{} hook: {hook}", phase.as_str()));
        run_checked(runner, &request)
            .await
            .with_context(|| format!("{} hook failed", phase.as_str()))?;
    }
    Ok(())
}

/// Run `hooks`, downgrading a failure to a warning.
pub async fn run_hooks_best_effort(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    phase: HookPhase,
    hooks: &[String],
    ctx: HookContext<'_>,
) {
    if let Err(err) = run_hooks(runner, reporter, phase, hooks, ctx).await {
        reporter.warn(&format!("{err:#}"));
    }
}
