//! File-backed credential store.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "entries": {
//!     "secret": "...",
//!     "issued_at": "2026-01-31T00:00:00+00:00"
//!   }
//! }
//! ```
//!
//! Empty files, corrupt JSON and unknown versions read as an empty store and
//! are overwritten by the next write. Writes go through a temp file in the
//! same directory and a rename, so a crash never leaves a half-written file.
//! The temp file is created owner-only, which the rename preserves.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;

use super::CredentialStore;
use crate::error::{GateError, Result};

const FILE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, String>,
}

pub struct FileCredentialStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileCredentialStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new())
            }
            Err(source) => {
                return Err(GateError::StorageIo {
                    context: "read credentials file".to_string(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %self.path.display(), "Empty credentials file");
            return Ok(BTreeMap::new());
        }

        match serde_json::from_str::<StoreFile>(&content) {
            Ok(file) if file.version == FILE_VERSION => Ok(file.entries),
            Ok(file) => {
                tracing::warn!(
                    version = file.version,
                    expected = FILE_VERSION,
                    "Unsupported credentials file version, treating as empty"
                );
                Ok(BTreeMap::new())
            }
            Err(err) => {
                tracing::warn!(error = %err, "Corrupt credentials file, treating as empty");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let io_err = |context: &str, source: std::io::Error| GateError::StorageIo {
            context: context.to_string(),
            source,
        };

        let parent_dir = self.path.parent().ok_or_else(|| {
            GateError::StorageBackend("credentials path has no parent directory".to_string())
        })?;
        fs::create_dir_all(parent_dir).map_err(|e| io_err("create store directory", e))?;

        let file = StoreFile {
            version: FILE_VERSION,
            entries: entries.clone(),
        };
        let content =
            serde_json::to_string_pretty(&file).map_err(|source| GateError::StorageFormat {
                context: "serialize credentials".to_string(),
                source,
            })?;

        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|e| io_err("create temp file", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| io_err("write temp file", e))?;
        temp_file
            .flush()
            .map_err(|e| io_err("flush temp file", e))?;
        temp_file
            .persist(&self.path)
            .map_err(|e| io_err("persist credentials file", e.error))?;
        Ok(())
    }

    fn modify(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GateError::StorageBackend("file store lock poisoned".to_string()))?;
        let mut entries = self.read_entries()?;
        f(&mut entries);
        self.write_entries(&entries)
    }
}

impl CredentialStore for FileCredentialStore {
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
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| GateError::StorageBackend("file store lock poisoned".to_string()))?;
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(GateError::StorageIo {
                context: "remove credentials file".to_string(),
                source,
            }),
        }
    }

    fn entries(&self) -> Result<BTreeMap<String, String>> {
        self.read_entries()
    }
}
