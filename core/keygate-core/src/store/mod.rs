//! Credential Store
//!
//! Durable string key/value persistence for the session secret and its small
//! metadata. The session controller is the only writer.
//!
//! # Backends
//!
//! - [`MemoryCredentialStore`]: process-lifetime map, used by tests and ephemeral sessions
//! - [`FileCredentialStore`]: JSON file under the storage root (default)
//! - `KeyringCredentialStore`: OS keychain / secret service (cargo feature `keyring`)
//!
//! Backends report failures as `Storage` errors. Swallowing them ("treat as
//! absent") is the controller's job, see [`crate::credential`].

mod file;
#[cfg(feature = "keyring")]
mod keychain;
mod memory;

pub use file::FileCredentialStore;
#[cfg(feature = "keyring")]
pub use keychain::{KeyringCredentialStore, DEFAULT_ACCOUNT, DEFAULT_SERVICE};
pub use memory::MemoryCredentialStore;

use std::collections::BTreeMap;

use crate::error::Result;

/// Persisted entry keys.
pub mod keys {
    pub const SECRET: &str = "secret";
    pub const ISSUED_AT: &str = "issued_at";
    pub const LAST_CONFIRMED_AT: &str = "last_confirmed_at";
    pub const LAST_ACTIVITY_AT: &str = "last_activity_at";
    pub const LOCKED_AT: &str = "locked_at";
    pub const SERVER_URL: &str = "server_url";
    pub const LAST_STATUS: &str = "last_status";
}

pub trait CredentialStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;

    /// Removes every entry.
    fn clear(&self) -> Result<()>;

    /// Snapshot of all entries.
    fn entries(&self) -> Result<BTreeMap<String, String>>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.entries()?.is_empty())
    }
}

impl<S: CredentialStore + ?Sized> CredentialStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        (**self).entries()
    }
}

impl<S: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        (**self).entries()
    }
}
