//! `keygate config` subcommands.

use std::io::Write;

use keygate_core::{load_config, read_config, save_config, StorageConfig};

use crate::CliError;

/// Prints the effective configuration (file + env overrides) as JSON.
pub fn show(storage: &StorageConfig, out: &mut impl Write) -> Result<(), CliError> {
    let config = load_config(storage);
    let json = serde_json::to_string_pretty(&config).map_err(std::io::Error::other)?;
    writeln!(out, "{}", json)?;
    writeln!(out, "# {}", storage.config_file().display())?;
    Ok(())
}

/// Points keygate at another server. The next `status` signs out of the old one.
pub fn set_server(storage: &StorageConfig, url: &str, out: &mut impl Write) -> Result<(), CliError> {
    let mut config = read_config(storage)?;
    let previous = config.normalized_server_url();
    config.set_server_url(url)?;
    save_config(storage, &config)?;

    tracing::info!(previous = %previous, server = %config.server_url, "Server URL updated");
    writeln!(out, "Server set to {}", config.server_url)?;
    if !previous.is_empty() && previous != config.normalized_server_url() {
        writeln!(out, "  Credentials for {} will be cleared on next use.", previous)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_server_persists_normalized_url() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig::with_root(dir.path().to_path_buf());
        let mut out = Vec::new();

        set_server(&storage, "https://vault.example/", &mut out).unwrap();
        let config = read_config(&storage).unwrap();
        assert_eq!(config.server_url, "https://vault.example");
        assert!(String::from_utf8(out).unwrap().contains("Server set to"));
    }

    #[test]
    fn set_server_rejects_bad_url() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig::with_root(dir.path().to_path_buf());
        let err = set_server(&storage, "ftp://vault.example", &mut Vec::new()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn changing_server_warns_about_credentials() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig::with_root(dir.path().to_path_buf());
        set_server(&storage, "https://old.example", &mut Vec::new()).unwrap();

        let mut out = Vec::new();
        set_server(&storage, "https://new.example", &mut out).unwrap();
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("Credentials for https://old.example"));
    }
}
