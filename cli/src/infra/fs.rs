//! Filesystem infrastructure: implements `LocalFs` and `LocalPaths`.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Production filesystem implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFs;

fn create_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display())),
        _ => Ok(()),
    }
}

impl crate::application::ports::LocalFs for LocalFs {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn write(&self, path: &Path, content: &str) -> Result<()> {
        create_parent(path)?;
        std::fs::write(path, content).with_context(|| format!("writing file {}", path.display()))
    }

    fn append(&self, path: &Path, content: &str) -> Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("appending to {}", path.display()))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
                Err(e).with_context(|| format!("removing file {}", path.display()))
            }
            _ => Ok(()),
        }
    }

    fn scratch_dir(&self, prefix: &str) -> Result<tempfile::TempDir> {
        tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .context("creating temporary directory")
    }
}

impl crate::application::ports::LocalPaths for LocalFs {
    fn kube_dir(&self) -> Result<PathBuf> {
        dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))
            .map(|h| h.join(".kube"))
    }
}
