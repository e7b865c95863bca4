//! File system paths for the client runtime.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the client runtime.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for runtime files (~/.minuet)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.minuet`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".minuet"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.minuet).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.minuet/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the client state file path (~/.minuet/state.json).
    ///
    /// Holds the persisted session documents (token pair, cached profile,
    /// UI preferences), one JSON document per storage key.
    pub fn state_file(&self) -> PathBuf {
        self.base_dir.join("state.json")
    }

    /// Get the logs directory (~/.minuet/logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        Ok(())
    }
}
