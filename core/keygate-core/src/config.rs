//! Configuration loading and saving.
//!
//! `config.json` lives under the storage root. A missing or malformed file
//! yields defaults; saving is atomic (temp file + rename).

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::env;
use std::io::Write;

use tempfile::NamedTempFile;

use crate::error::{GateError, Result};
use crate::retry::RetryPolicy;
use crate::storage::StorageConfig;

/// Overrides `server_url` from the config file.
pub const SERVER_URL_ENV: &str = "KEYGATE_SERVER_URL";

const DEFAULT_VALIDATE_PATH: &str = "/api/session";
const DEFAULT_AUTH_SCHEME: &str = "Bearer";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// What `lock()` does to the stored secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LockPolicy {
    /// Remove the stored secret; unlocking needs the secret again.
    #[default]
    ClearSecret,
    /// Keep the stored secret and mark the session locked.
    KeepSecret,
}

/// What `initialize()` settles on when the validator cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransportFailurePolicy {
    /// Keep the last settled state of this process, or `locked` if none.
    #[default]
    KeepLastKnown,
    /// Always report `locked`.
    Lock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Base URL of the service that validates credentials. Empty until configured.
    pub server_url: String,
    pub validate_path: String,
    pub auth_scheme: String,
    pub timeout_ms: u64,
    /// Seconds after a confirmation during which protected actions skip re-asking.
    pub reprompt_window_secs: Option<u64>,
    /// Seconds of inactivity after which an active session locks.
    pub idle_timeout_secs: Option<u64>,
    pub lock_policy: LockPolicy,
    pub transport_failure: TransportFailurePolicy,
    pub retry: RetryPolicy,
    pub store: StoreBackend,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            server_url: String::new(),
            validate_path: DEFAULT_VALIDATE_PATH.to_string(),
            auth_scheme: DEFAULT_AUTH_SCHEME.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            reprompt_window_secs: None,
            idle_timeout_secs: None,
            lock_policy: LockPolicy::default(),
            transport_failure: TransportFailurePolicy::default(),
            retry: RetryPolicy::default(),
            store: StoreBackend::default(),
        }
    }
}

impl GateConfig {
    /// Full URL of the validation endpoint.
    pub fn validate_url(&self) -> String {
        let base = self.server_url.trim_end_matches('/');
        let path = self.validate_path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Server URL with the trailing slash stripped, used to fingerprint records.
    pub fn normalized_server_url(&self) -> String {
        self.server_url.trim().trim_end_matches('/').to_string()
    }

    pub fn set_server_url(&mut self, url: &str) -> Result<()> {
        let trimmed = url.trim();
        if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
            return Err(GateError::InvalidServerUrl(url.to_string()));
        }
        self.server_url = trimmed.trim_end_matches('/').to_string();
        Ok(())
    }

    fn apply_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(SERVER_URL_ENV) {
            if !url.trim().is_empty() {
                self.server_url = url.trim().trim_end_matches('/').to_string();
            }
        }
        self
    }
}

/// Loads configuration, returning defaults if the file is missing or malformed.
/// `KEYGATE_SERVER_URL` overrides the stored server.
pub fn load_config(storage: &StorageConfig) -> GateConfig {
    let config = match read_config(storage) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(error = %err, "Falling back to default configuration");
            GateConfig::default()
        }
    };
    config.apply_env_overrides()
}

/// Reads configuration without env overrides, surfacing parse errors.
pub fn read_config(storage: &StorageConfig) -> Result<GateConfig> {
    let path = storage.config_file();
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(GateConfig::default())
        }
        Err(err) => {
            return Err(GateError::ConfigMalformed {
                path,
                details: err.to_string(),
            })
        }
    };

    if content.trim().is_empty() {
        return Ok(GateConfig::default());
    }

    serde_json::from_str(&content).map_err(|err| GateError::ConfigMalformed {
        path,
        details: err.to_string(),
    })
}

/// Saves configuration to disk.
pub fn save_config(storage: &StorageConfig, config: &GateConfig) -> Result<()> {
    let path = storage.config_file();
    let write_failed = |source: std::io::Error| GateError::ConfigWriteFailed {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(storage.root()).map_err(write_failed)?;
    let content = serde_json::to_string_pretty(config).map_err(|err| {
        GateError::ConfigMalformed {
            path: path.clone(),
            details: err.to_string(),
        }
    })?;

    let mut temp_file = NamedTempFile::new_in(storage.root()).map_err(write_failed)?;
    temp_file
        .write_all(content.as_bytes())
        .map_err(write_failed)?;
    temp_file.flush().map_err(write_failed)?;
    temp_file
        .persist(&path)
        .map_err(|err| write_failed(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        let config = read_config(&storage).unwrap();
        assert_eq!(config, GateConfig::default());
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn save_then_read_preserves_policies() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().join("nested"));
        let mut config = GateConfig {
            lock_policy: LockPolicy::KeepSecret,
            idle_timeout_secs: Some(900),
            ..GateConfig::default()
        };
        config.set_server_url("https://vault.example.com/").unwrap();

        save_config(&storage, &config).unwrap();
        let loaded = read_config(&storage).unwrap();

        assert_eq!(loaded.server_url, "https://vault.example.com");
        assert_eq!(loaded.lock_policy, LockPolicy::KeepSecret);
        assert_eq!(loaded.idle_timeout_secs, Some(900));
    }

    #[test]
    fn malformed_file_is_reported_by_read() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(storage.config_file(), "{not json").unwrap();

        let err = read_config(&storage).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let temp = tempdir().unwrap();
        let storage = StorageConfig::with_root(temp.path().to_path_buf());
        std::fs::write(
            storage.config_file(),
            r#"{"server_url": "https://a.example", "lock_policy": "keep-secret"}"#,
        )
        .unwrap();

        let config = read_config(&storage).unwrap();
        assert_eq!(config.validate_path, "/api/session");
        assert_eq!(config.lock_policy, LockPolicy::KeepSecret);
        assert_eq!(config.transport_failure, TransportFailurePolicy::KeepLastKnown);
    }

    #[test]
    fn validate_url_joins_without_double_slash() {
        let config = GateConfig {
            server_url: "https://a.example/".to_string(),
            validate_path: "/me".to_string(),
            ..GateConfig::default()
        };
        assert_eq!(config.validate_url(), "https://a.example/me");
    }

    #[test]
    fn rejects_non_http_server_url() {
        let mut config = GateConfig::default();
        let err = config.set_server_url("ftp://nope").unwrap_err();
        assert!(matches!(err, GateError::InvalidServerUrl(_)));
        assert!(config.server_url.is_empty());
    }
}
