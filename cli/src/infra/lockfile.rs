//! Infrastructure implementation of the `LockfileStore` port.
//!
//! `LockfileManager` reads and writes `<project root>/.silo.lock` on a
//! blocking thread, with atomic write (temp file + rename) so an
//! interrupted write never leaves a truncated lockfile behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use silo_common::{LOCKFILE_NAME, Lockfile};

use crate::application::ports::LockfileStore;
use crate::domain::error::LockfileError;

/// Lockfile manager for one project root.
#[derive(Debug, Clone)]
pub struct LockfileManager {
    path: PathBuf,
}

impl LockfileManager {
    /// Manage the lockfile of `project_root`.
    #[must_use]
    pub fn new(project_root: &Path) -> Self {
        Self::with_path(project_root.join(LOCKFILE_NAME))
    }

    /// Manage a lockfile at an explicit path (used in tests).
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_sync(path: &Path) -> Result<Option<Lockfile>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading lockfile {}", path.display()))?;
        let lockfile = serde_json::from_str(&content).map_err(|e| LockfileError::Invalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Some(lockfile))
    }

    fn save_sync(path: &Path, lockfile: &Lockfile) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        let mut content = serde_json::to_string_pretty(lockfile).context("serializing lockfile")?;
        content.push('\n');

        let temp_path = path.with_extension("lock.tmp");
        std::fs::write(&temp_path, &content)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("setting permissions on {}", temp_path.display()))?;
        }

        std::fs::rename(&temp_path, path)
            .with_context(|| format!("finalizing lockfile {}", path.display()))?;
        Ok(())
    }

    fn remove_sync(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing lockfile {}", path.display()))
            }
            _ => Ok(()),
        }
    }
}

impl LockfileStore for LockfileManager {
    async fn read(&self) -> Result<Option<Lockfile>> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::load_sync(&path))
            .await
            .context("lockfile load task panicked")?
    }

    async fn write(&self, lockfile: &Lockfile) -> Result<()> {
        let path = self.path.clone();
        let lockfile = lockfile.clone();
        tokio::task::spawn_blocking(move || Self::save_sync(&path, &lockfile))
            .await
            .context("lockfile save task panicked")?
    }

    async fn remove(&self) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || Self::remove_sync(&path))
            .await
            .context("lockfile remove task panicked")?
    }

    fn path(&self) -> &Path {
        &self.path
    }
}
