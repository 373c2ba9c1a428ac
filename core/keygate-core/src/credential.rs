//! Credential Record: the typed view over the store's string entries.
//!
//! Reads and writes here never fail. A storage error is logged and the value
//! is treated as absent (reads) or dropped (writes); absence is a legitimate
//! first-run state, and the gate can always ask for fresh input.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use crate::clock::parse_rfc3339;
use crate::store::{keys, CredentialStore};

const MAX_WINDOW_SECS: u64 = (i64::MAX / 1_000) as u64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialRecord {
    pub secret: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub last_confirmed_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    /// A `locked_at` entry is stored, readable or not.
    pub lock_marker: bool,
    pub server_url: Option<String>,
    pub last_status: Option<String>,
}

impl CredentialRecord {
    /// A record exists once anything has been written, even if the secret was
    /// later cleared by a lock.
    pub fn exists(&self) -> bool {
        self.secret.is_some()
            || self.issued_at.is_some()
            || self.last_confirmed_at.is_some()
            || self.last_activity_at.is_some()
            || self.is_locked()
            || self.server_url.is_some()
    }

    /// An unreadable lock marker still counts as locked.
    pub fn is_locked(&self) -> bool {
        self.lock_marker || self.locked_at.is_some()
    }

    /// Whether a confirmation at `last_confirmed_at` still covers `now`.
    pub fn within_reprompt_window(&self, now: DateTime<Utc>, window_secs: Option<u64>) -> bool {
        match (self.last_confirmed_at, window_secs) {
            (Some(confirmed), Some(window)) if window > 0 => {
                let elapsed = now.signed_duration_since(confirmed);
                elapsed >= Duration::zero() && elapsed < secs(window)
            }
            _ => false,
        }
    }

    /// Whether the session sat idle longer than `idle_secs`.
    /// Without a recorded activity time the session is not considered idle.
    pub fn idle_expired(&self, now: DateTime<Utc>, idle_secs: Option<u64>) -> bool {
        match (self.last_activity_at, idle_secs) {
            (Some(last), Some(idle)) if idle > 0 => now.signed_duration_since(last) >= secs(idle),
            _ => false,
        }
    }
}

fn secs(value: u64) -> Duration {
    // chrono panics past i64::MAX milliseconds
    Duration::seconds(value.min(MAX_WINDOW_SECS) as i64)
}

pub(crate) fn load_record(store: &dyn CredentialStore) -> CredentialRecord {
    let entries = match store.entries() {
        Ok(entries) => entries,
        Err(err) => {
            warn!(error = %err, "Credential store unreadable, treating as empty");
            return CredentialRecord::default();
        }
    };

    let text = |key: &str| entries.get(key).filter(|v| !v.is_empty()).cloned();
    let time = |key: &str| {
        let raw = entries.get(key)?;
        let parsed = parse_rfc3339(raw);
        if parsed.is_none() {
            warn!(key, value = %raw, "Ignoring unparseable timestamp in credential store");
        }
        parsed
    };

    CredentialRecord {
        secret: text(keys::SECRET),
        issued_at: time(keys::ISSUED_AT),
        last_confirmed_at: time(keys::LAST_CONFIRMED_AT),
        last_activity_at: time(keys::LAST_ACTIVITY_AT),
        locked_at: time(keys::LOCKED_AT),
        lock_marker: text(keys::LOCKED_AT).is_some(),
        server_url: text(keys::SERVER_URL),
        last_status: text(keys::LAST_STATUS),
    }
}

pub(crate) fn put(store: &dyn CredentialStore, key: &str, value: &str) -> bool {
    match store.set(key, value) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, key, "Failed to write credential entry");
            false
        }
    }
}

pub(crate) fn put_time(store: &dyn CredentialStore, key: &str, value: DateTime<Utc>) -> bool {
    put(store, key, &value.to_rfc3339())
}

pub(crate) fn drop_key(store: &dyn CredentialStore, key: &str) -> bool {
    match store.remove(key) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, key, "Failed to remove credential entry");
            false
        }
    }
}

pub(crate) fn wipe(store: &dyn CredentialStore) -> bool {
    match store.clear() {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "Failed to clear credential store");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GateError, Result};
    use crate::store::MemoryCredentialStore;
    use std::collections::BTreeMap;

    struct BrokenStore;

    impl CredentialStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(GateError::StorageBackend("disk on fire".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(GateError::StorageBackend("disk on fire".into()))
        }
        fn remove(&self, _key: &str) -> Result<()> {
            Err(GateError::StorageBackend("disk on fire".into()))
        }
        fn clear(&self) -> Result<()> {
            Err(GateError::StorageBackend("disk on fire".into()))
        }
        fn entries(&self) -> Result<BTreeMap<String, String>> {
            Err(GateError::StorageBackend("disk on fire".into()))
        }
    }

    fn at(value: &str) -> DateTime<Utc> {
        parse_rfc3339(value).unwrap()
    }

    #[test]
    fn empty_store_has_no_record() {
        let store = MemoryCredentialStore::new();
        assert!(!load_record(&store).exists());
    }

    #[test]
    fn unreadable_store_reads_as_absent() {
        let record = load_record(&BrokenStore);
        assert_eq!(record, CredentialRecord::default());
        assert!(!put(&BrokenStore, keys::SECRET, "abc"));
        assert!(!wipe(&BrokenStore));
    }

    #[test]
    fn record_without_secret_still_exists() {
        let store = MemoryCredentialStore::with_entries([(keys::ISSUED_AT, "2026-01-31T00:00:00Z")]);
        let record = load_record(&store);
        assert!(record.exists());
        assert!(record.secret.is_none());
    }

    #[test]
    fn bad_timestamps_are_ignored() {
        let store = MemoryCredentialStore::with_entries([
            (keys::SECRET, "abc"),
            (keys::LAST_ACTIVITY_AT, "not-a-time"),
        ]);
        let record = load_record(&store);
        assert_eq!(record.secret.as_deref(), Some("abc"));
        assert_eq!(record.last_activity_at, None);
    }

    #[test]
    fn unreadable_lock_marker_still_locks() {
        let store = MemoryCredentialStore::with_entries([
            (keys::SECRET, "abc"),
            (keys::LOCKED_AT, "not-a-time"),
        ]);
        let record = load_record(&store);
        assert_eq!(record.locked_at, None);
        assert!(record.is_locked());
        assert!(record.exists());
    }

    #[test]
    fn reprompt_window_bounds() {
        let record = CredentialRecord {
            last_confirmed_at: Some(at("2026-01-31T00:00:00Z")),
            ..CredentialRecord::default()
        };
        assert!(record.within_reprompt_window(at("2026-01-31T00:04:59Z"), Some(300)));
        assert!(!record.within_reprompt_window(at("2026-01-31T00:05:00Z"), Some(300)));
        assert!(!record.within_reprompt_window(at("2026-01-31T00:01:00Z"), None));
        assert!(!record.within_reprompt_window(at("2026-01-31T00:01:00Z"), Some(0)));
    }

    #[test]
    fn idle_timeout_bounds() {
        let record = CredentialRecord {
            last_activity_at: Some(at("2026-01-31T00:00:00Z")),
            ..CredentialRecord::default()
        };
        assert!(!record.idle_expired(at("2026-01-31T00:14:59Z"), Some(900)));
        assert!(record.idle_expired(at("2026-01-31T00:15:00Z"), Some(900)));
        assert!(!record.idle_expired(at("2026-02-28T00:00:00Z"), None));
        assert!(!CredentialRecord::default().idle_expired(at("2026-01-31T00:00:00Z"), Some(1)));
    }
}
