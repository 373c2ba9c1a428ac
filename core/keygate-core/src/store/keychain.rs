//! OS keyring backend: all entries serialized as one JSON secret.

use std::collections::BTreeMap;
use std::sync::Mutex;

use super::CredentialStore;
use crate::error::{GateError, Result};

pub const DEFAULT_SERVICE: &str = "keygate";

/// One account per service. The stored `server_url` decides which server the
/// record belongs to, so switching servers signs out instead of orphaning it.
pub const DEFAULT_ACCOUNT: &str = "default";

pub struct KeyringCredentialStore {
    service: String,
    account: String,
    write_lock: Mutex<()>,
}

impl KeyringCredentialStore {
    pub fn new(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    fn entry(&self) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, &self.account)
            .map_err(|e| GateError::StorageBackend(format!("keyring entry: {}", e)))
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let raw = match self.entry()?.get_password() {
            Ok(raw) => raw,
            Err(keyring::Error::NoEntry) => return Ok(BTreeMap::new()),
            Err(e) => return Err(GateError::StorageBackend(format!("keyring read: {}", e))),
        };
        serde_json::from_str(&raw).map_err(|source| GateError::StorageFormat {
            context: "parse keyring entries".to_string(),
            source,
        })
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let raw = serde_json::to_string(entries).map_err(|source| GateError::StorageFormat {
            context: "serialize keyring entries".to_string(),
            source,
        })?;
        self.entry()?
            .set_password(&raw)
            .map_err(|e| GateError::StorageBackend(format!("keyring write: {}", e)))
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GateError::StorageBackend("keyring store lock poisoned".to_string()))?;
        let mut entries = self.read_entries()?;
        f(&mut entries);
        self.write_entries(&entries)
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_entries()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.modify(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.modify(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(GateError::StorageBackend(format!("keyring delete: {}", e))),
        }
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        self.read_entries()
    }
}
