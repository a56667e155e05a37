//! Read-modify-write helpers over the lockfile port.

use anyhow::Result;
use silo_common::{InstanceState, Lockfile};

use crate::application::ports::LockfileStore;
use crate::domain::error::LockfileError;

/// The recorded instance, if a lockfile exists.
///
/// # Errors
///
/// Returns an error if the lockfile exists but cannot be read or parsed.
pub async fn read_state(store: &impl LockfileStore) -> Result<Option<InstanceState>> {
    Ok(store.read().await?.map(|lock| lock.instance))
}

/// Persist `state` in a fresh envelope, superseding the previous lockfile.
///
/// # Errors
///
/// Returns an error if the lockfile cannot be written.
pub async fn write_state(store: &impl LockfileStore, state: &InstanceState) -> Result<()> {
    store.write(&Lockfile::new(state.clone())).await
}

/// Apply `transform` to the recorded instance and write it back.
///
/// # Errors
///
/// Returns [`LockfileError::Missing`] when there is no lockfile, or an
/// error from reading or writing it.
pub async fn update_state(
    store: &impl LockfileStore,
    transform: impl FnOnce(&mut InstanceState),
) -> Result<InstanceState> {
    let Some(mut state) = read_state(store).await? else {
        return Err(LockfileError::Missing.into());
    };
    transform(&mut state);
    write_state(store, &state).await?;
    Ok(state)
}
