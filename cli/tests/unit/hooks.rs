//! Lifecycle hook ordering and failure handling.

#![allow(clippy::expect_used)]

use std::path::Path;

use silo_cli::application::ports::StdioMode;
use silo_cli::application::services::hooks::{HookContext, run_hooks, run_hooks_best_effort};
use silo_cli::domain::config::HookPhase;
use silo_cli::domain::error::error_code;
use silo_common::OrderedMap;

use crate::mocks::{Level, RecordingReporter, ScriptedRunner, fail};

fn hooks(list: &[&str]) -> Vec<String> {
    list.iter().map(|h| (*h).to_string()).collect()
}

fn env() -> OrderedMap<String> {
    [("SILO_WORKSPACE", "main".to_string())].into_iter().collect()
}

#[tokio::test]
async fn hooks_run_in_order_through_the_shell() {
    let runner = ScriptedRunner::new();
    let reporter = RecordingReporter::new();
    let env = env();

    run_hooks(
        &runner,
        &reporter,
        HookPhase::PreUp,
        &hooks(&["make deps", "make migrate"]),
        HookContext {
            cwd: Path::new("/project"),
            env: &env,
        },
    )
    .await
    .expect("hooks pass");

    let requests = runner.requests();
    assert_eq!(
        runner.calls(),
        vec!["/bin/sh -c make deps", "/bin/sh -c make migrate"]
    );
    for request in &requests {
        assert_eq!(request.cwd.as_deref(), Some(Path::new("/project")));
        assert_eq!(request.env.get("SILO_WORKSPACE").map(String::as_str), Some("main"));
        assert_eq!(request.stdio, StdioMode::Inherit);
        assert!(request.timeout.is_some());
    }
}

#[tokio::test]
async fn first_failure_aborts_the_phase() {
    let runner = ScriptedRunner::new().on("/bin/sh -c second", fail(2, ""));
    let reporter = RecordingReporter::new();
    let env = env();

    let err = run_hooks(
        &runner,
        &reporter,
        HookPhase::PreUp,
        &hooks(&["first", "second", "third"]),
        HookContext {
            cwd: Path::new("/project"),
            env: &env,
        },
    )
    .await
    .expect_err("second hook fails");

    assert_eq!(error_code(&err), Some("COMMAND_FAILED"));
    assert!(format!("{err:#}").contains("pre-up"));
    assert_eq!(runner.count("/bin/sh -c third"), 0);
}

#[tokio::test]
async fn empty_phase_runs_nothing() {
    let runner = ScriptedRunner::new();
    let reporter = RecordingReporter::new();
    let env = env();

    run_hooks(
        &runner,
        &reporter,
        HookPhase::PostUp,
        &[],
        HookContext {
            cwd: Path::new("/project"),
            env: &env,
        },
    )
    .await
    .expect("nothing to run");

    assert!(runner.calls().is_empty());
    assert!(reporter.events.borrow().is_empty());
}

#[tokio::test]
async fn best_effort_phase_only_warns() {
    let runner = ScriptedRunner::new().on("/bin/sh -c cleanup", fail(1, ""));
    let reporter = RecordingReporter::new();
    let env = env();

    run_hooks_best_effort(
        &runner,
        &reporter,
        HookPhase::PostDown,
        &hooks(&["cleanup"]),
        HookContext {
            cwd: Path::new("/project"),
            env: &env,
        },
    )
    .await;

    assert!(reporter.saw(Level::Warn, "post-down"));
}
