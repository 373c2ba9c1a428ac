//! Error types for keygate-core operations.
//!
//! Callers branch on [`ErrorKind`], never on message text.

use std::path::PathBuf;

/// Coarse classification used by the session controller and the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network, DNS, timeout, or a server-side failure. Worth retrying.
    Transport,
    /// The remote service refused the credential.
    Rejected,
    /// The credential store could not be read or written.
    Storage,
    /// Configuration could not be parsed or persisted.
    Config,
}

/// All errors that can occur in keygate-core operations.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    // ─────────────────────────────────────────────────────────────────────
    // Remote Validation
    // ─────────────────────────────────────────────────────────────────────
    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Credential rejected{}", expiry_suffix(.expired))]
    Rejected { expired: bool },

    // ─────────────────────────────────────────────────────────────────────
    // Storage
    // ─────────────────────────────────────────────────────────────────────
    #[error("Credential store I/O error: {context}: {source}")]
    StorageIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Credential store is malformed: {context}: {source}")]
    StorageFormat {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Credential store backend error: {0}")]
    StorageBackend(String),

    // ─────────────────────────────────────────────────────────────────────
    // Configuration
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration write failed: {path}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid server URL: {0}")]
    InvalidServerUrl(String),
}

impl GateError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::Transport { .. } => ErrorKind::Transport,
            GateError::Rejected { .. } => ErrorKind::Rejected,
            GateError::StorageIo { .. }
            | GateError::StorageFormat { .. }
            | GateError::StorageBackend(_) => ErrorKind::Storage,
            GateError::HomeDirNotFound
            | GateError::ConfigMalformed { .. }
            | GateError::ConfigWriteFailed { .. }
            | GateError::InvalidServerUrl(_) => ErrorKind::Config,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        GateError::Transport {
            message: message.into(),
        }
    }
}

fn expiry_suffix(expired: &bool) -> &'static str {
    if *expired {
        " (expired)"
    } else {
        ""
    }
}

/// Convenience type alias for Results using GateError.
pub type Result<T> = std::result::Result<T, GateError>;

impl From<GateError> for String {
    fn from(err: GateError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_variants() {
        assert_eq!(GateError::transport("timeout").kind(), ErrorKind::Transport);
        assert_eq!(
            GateError::Rejected { expired: true }.kind(),
            ErrorKind::Rejected
        );
        assert_eq!(
            GateError::StorageBackend("locked keychain".into()).kind(),
            ErrorKind::Storage
        );
        assert_eq!(GateError::HomeDirNotFound.kind(), ErrorKind::Config);
    }

    #[test]
    fn rejected_message_mentions_expiry() {
        assert_eq!(
            GateError::Rejected { expired: true }.to_string(),
            "Credential rejected (expired)"
        );
        assert_eq!(
            GateError::Rejected { expired: false }.to_string(),
            "Credential rejected"
        );
    }
}
