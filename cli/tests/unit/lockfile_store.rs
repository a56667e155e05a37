//! Lockfile persistence through the real store on a temp directory.

#![allow(clippy::expect_used)]

use silo_cli::application::ports::LockfileStore;
use silo_cli::application::services::lockfile::{read_state, update_state, write_state};
use silo_cli::domain::error::error_code;
use silo_cli::infra::lockfile::LockfileManager;

use crate::helpers::{k3d_state, ports, state};
use crate::mocks::CorruptLockfile;

#[tokio::test]
async fn state_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LockfileManager::new(dir.path());
    let original = k3d_state("main", ports(&[("WEB_PORT", 3000), ("K3D_REGISTRY_PORT", 5001)]));

    write_state(&store, &original).await.expect("writes");
    let loaded = read_state(&store).await.expect("reads").expect("present");

    assert_eq!(loaded, original);
    let keys: Vec<_> = loaded.ports.keys().collect();
    assert_eq!(keys, ["WEB_PORT", "K3D_REGISTRY_PORT"]);
}

#[tokio::test]
async fn written_lockfile_uses_camel_case_envelope() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LockfileManager::new(dir.path());

    write_state(&store, &state("main", ports(&[("WEB_PORT", 3000)])))
        .await
        .expect("writes");

    let raw = std::fs::read_to_string(dir.path().join(".silo.lock")).expect("file exists");
    let value: serde_json::Value = serde_json::from_str(&raw).expect("valid json");
    assert_eq!(value["version"], 1);
    assert!(value["generatedAt"].is_string());
    assert_eq!(value["instance"]["name"], "main");
    assert_eq!(value["instance"]["k3dClusterCreated"], false);
    assert!(value["instance"].get("tiltPid").is_none());
    assert!(!dir.path().join(".silo.lock.tmp").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn lockfile_is_private_to_the_user() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("tempdir");
    let store = LockfileManager::new(dir.path());
    write_state(&store, &state("main", ports(&[("WEB_PORT", 3000)])))
        .await
        .expect("writes");

    let mode = std::fs::metadata(store.path()).expect("metadata").permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}

#[tokio::test]
async fn absent_lockfile_reads_as_none() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LockfileManager::new(dir.path());
    assert!(read_state(&store).await.expect("reads").is_none());
}

#[tokio::test]
async fn update_without_lockfile_is_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LockfileManager::new(dir.path());

    let err = update_state(&store, |s| s.k3d_cluster_created = true)
        .await
        .expect_err("nothing to update");

    assert_eq!(error_code(&err), Some("LOCKFILE_MISSING"));
    assert!(!store.path().exists(), "update must not create a lockfile");
}

#[tokio::test]
async fn update_applies_transform_and_persists() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LockfileManager::new(dir.path());
    write_state(&store, &state("main", ports(&[("WEB_PORT", 3000)])))
        .await
        .expect("writes");

    let updated = update_state(&store, |s| s.k3d_cluster_created = true)
        .await
        .expect("updates");

    assert!(updated.k3d_cluster_created);
    let reloaded = read_state(&store).await.expect("reads").expect("present");
    assert!(reloaded.k3d_cluster_created);
}

#[tokio::test]
async fn corrupt_lockfile_is_invalid() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(".silo.lock"), "{not json").expect("write");
    let store = LockfileManager::new(dir.path());

    let err = read_state(&store).await.expect_err("corrupt");
    assert_eq!(error_code(&err), Some("INVALID_LOCKFILE"));

    let err = read_state(&CorruptLockfile).await.expect_err("corrupt");
    assert_eq!(error_code(&err), Some("INVALID_LOCKFILE"));
}

#[tokio::test]
async fn remove_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = LockfileManager::new(dir.path());
    write_state(&store, &state("main", ports(&[("WEB_PORT", 3000)])))
        .await
        .expect("writes");

    store.remove().await.expect("removes");
    store.remove().await.expect("second remove is fine");
    assert!(!store.path().exists());
}
