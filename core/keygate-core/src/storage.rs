//! Storage configuration and path management for keygate.
//!
//! All file paths keygate touches are derived from one `StorageConfig`, so
//! tests can point everything at a temp directory with [`StorageConfig::with_root`].

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{GateError, Result};

/// Overrides the default `~/.keygate` root.
pub const HOME_ENV: &str = "KEYGATE_HOME";

/// Central configuration for all keygate storage paths.
///
/// Production code uses [`StorageConfig::from_env`], which honors `KEYGATE_HOME`
/// and otherwise points to `~/.keygate/`.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the storage root from `KEYGATE_HOME` or the home directory.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            return Ok(Self {
                root: PathBuf::from(root),
            });
        }
        let home = dirs::home_dir().ok_or(GateError::HomeDirNotFound)?;
        Ok(Self {
            root: home.join(".keygate"),
        })
    }

    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to config.json (server and session policy).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Path to credentials.json (file-backed credential store).
    pub fn credentials_file(&self) -> PathBuf {
        self.root.join("credentials.json")
    }

    /// Path to the logs/ directory (rolling CLI logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
