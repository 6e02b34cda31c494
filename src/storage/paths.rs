use std::path::{Path, PathBuf};

use crate::error::{CookforgeError, Result};

/// Manages all filesystem paths for cookforge state
#[derive(Debug, Clone)]
pub struct CookforgePaths {
    pub root: PathBuf,
}

impl CookforgePaths {
    /// Paths rooted at `~/.cookforge`
    pub fn new() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CookforgeError::Config("cannot determine home directory".into()))?;
        Ok(Self::with_root(home.join(".cookforge")))
    }

    /// Paths rooted somewhere else (tests, `--state-dir`)
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Path to the config.yaml file
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    /// Directory holding one snapshot per (host, organization)
    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn snapshot_file(&self, key: &str) -> PathBuf {
        self.cache_dir().join(format!("{key}.json"))
    }
}
