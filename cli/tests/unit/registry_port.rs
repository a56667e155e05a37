//! Registry port resolution and retry behaviour.

#![allow(clippy::expect_used)]

use std::path::Path;

use silo_cli::application::retry::RetryPolicy;
use silo_cli::application::services::registry_port::{resolve_once, resolve_registry_port};
use silo_cli::domain::error::error_code;

use crate::helpers::registry_list_json;
use crate::mocks::{RecordingReporter, ScriptedRunner, fail, ok};

const HOST: &str = "demo-main-registry.localhost";
const REGISTRY: &str = "demo-main-registry.localhost:5001";

fn root() -> &'static Path {
    Path::new("/project")
}

#[tokio::test]
async fn registry_listing_port_is_used() {
    let runner = ScriptedRunner::new().on(
        "k3d registry list",
        ok(&registry_list_json("k3d-demo-main-registry.localhost", 5002)),
    );

    let port = resolve_once(&runner, HOST, root()).await.expect("resolves");

    assert_eq!(port, 5002);
    assert_eq!(runner.count("docker"), 0);
}

#[tokio::test]
async fn container_fallback_when_listing_fails() {
    let runner = ScriptedRunner::new()
        .on("k3d registry list", fail(1, "unknown flag"))
        .on("docker ps", ok("k3d-demo-main-registry.localhost\n"))
        .on("docker port", ok("0.0.0.0:5003\n[::]:5003\n"));

    let port = resolve_once(&runner, HOST, root()).await.expect("resolves");

    assert_eq!(port, 5003);
    assert!(runner.calls().contains(&"docker port k3d-demo-main-registry.localhost 5000".to_string()));
}

#[tokio::test]
async fn missing_container_is_reported() {
    let runner = ScriptedRunner::new()
        .on("k3d registry list", ok("[]"))
        .on("docker ps", ok(""));

    let err = resolve_once(&runner, HOST, root()).await.expect_err("nothing to find");

    assert_eq!(error_code(&err), Some("REGISTRY_CONTAINER_MISSING"));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_are_retried() {
    let runner = ScriptedRunner::new()
        .on("k3d registry list", fail(1, "not ready"))
        .on("k3d registry list", fail(1, "not ready"))
        .on(
            "k3d registry list",
            ok(&registry_list_json("k3d-demo-main-registry.localhost", 5001)),
        )
        .on("docker ps", fail(1, "daemon starting"));
    let reporter = RecordingReporter::new();

    let port = resolve_registry_port(&runner, &reporter, REGISTRY, root(), RetryPolicy::REGISTRY_PORT)
        .await
        .expect("resolves on third attempt");

    assert_eq!(port, 5001);
    assert_eq!(runner.count("k3d registry list"), 3);
}

#[tokio::test(start_paused = true)]
async fn ambiguous_match_is_not_retried() {
    let listing = r#"[{"name":"a-demo-main-registry.localhost"},{"name":"b-demo-main-registry.localhost"}]"#;
    let runner = ScriptedRunner::new().on("k3d registry list", ok(listing));
    let reporter = RecordingReporter::new();

    let err = resolve_registry_port(&runner, &reporter, REGISTRY, root(), RetryPolicy::REGISTRY_PORT)
        .await
        .expect_err("ambiguous");

    assert_eq!(error_code(&err), Some("REGISTRY_CONTAINER_AMBIGUOUS"));
    assert_eq!(runner.count("k3d registry list"), 1);
    assert_eq!(runner.count("docker"), 0);
}

#[tokio::test(start_paused = true)]
async fn attempts_are_bounded() {
    let runner = ScriptedRunner::new()
        .on("k3d registry list", fail(1, "down"))
        .on("docker ps", fail(1, "down"));
    let reporter = RecordingReporter::new();

    let err = resolve_registry_port(&runner, &reporter, REGISTRY, root(), RetryPolicy::REGISTRY_PORT)
        .await
        .expect_err("never resolves");

    assert_eq!(error_code(&err), Some("REGISTRY_CONTAINER_LIST_FAILED"));
    assert_eq!(runner.count("k3d registry list"), 5);
}
