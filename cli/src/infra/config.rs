//! Infrastructure implementation of the `ConfigStore` port.

use std::path::Path;

use anyhow::{Context, Result};

use crate::application::ports::ConfigStore;
use crate::domain::config::{ConfigFile, ResolvedConfig};
use crate::domain::error::ConfigError;

/// Production implementation of `ConfigStore` that reads `silo.toml` from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct TomlConfigStore;

impl ConfigStore for TomlConfigStore {
    fn load(&self, path: &Path) -> Result<ResolvedConfig> {
        let path = std::path::absolute(path)
            .with_context(|| format!("cannot resolve {}", path.display()))?;
        if !path.is_file() {
            return Err(ConfigError::NotFound(path).into());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| ConfigError::Invalid(format!("{}: {}", path.display(), e.message())))?;
        ResolvedConfig::from_file(file, path)
    }
}
