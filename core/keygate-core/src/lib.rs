//! # keygate-core
//!
//! Gated sessions for clients that must not show protected content until a
//! stored credential has been confirmed by a remote service.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Clients can wrap with async if needed.
//! - **Thread-safe controller**: [`SessionController`] is `Send + Sync`; actions serialize internally.
//! - **Graceful degradation**: Storage failures read as absent, transport failures become notices.
//! - **Single writer**: Only the controller touches the credential store.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keygate_core::{FileCredentialStore, GateConfig, HttpValidator, SessionController};
//!
//! let storage = StorageConfig::from_env()?;
//! let config = load_config(&storage);
//! let controller = SessionController::new(
//!     FileCredentialStore::new(&storage.credentials_file()),
//!     HttpValidator::from_config(&config)?,
//!     SessionSettings::from(&config),
//! );
//! controller.initialize();
//! let gate = Gate::new(&controller);
//! ```

// Public modules
pub mod clock;
pub mod config;
pub mod credential;
pub mod error;
pub mod gate;
pub mod retry;
pub mod session;
pub mod storage;
pub mod store;
pub mod validator;

// Re-export commonly used items at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    load_config, read_config, save_config, GateConfig, LockPolicy, StoreBackend,
    TransportFailurePolicy,
};
pub use credential::CredentialRecord;
pub use error::{ErrorKind, GateError, Result};
pub use gate::{screen_for, FormSpec, Gate, GateOutput, Screen, SecretField};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use session::{
    ConfirmOutcome, Notice, NoticeAction, NoticeStyle, SessionController, SessionListener,
    SessionSettings, SessionSnapshot, SessionState,
};
pub use storage::StorageConfig;
pub use store::{keys, CredentialStore, FileCredentialStore, MemoryCredentialStore};
#[cfg(feature = "keyring")]
pub use store::{KeyringCredentialStore, DEFAULT_ACCOUNT, DEFAULT_SERVICE};
pub use validator::{HttpValidator, RemoteValidator, Validation};
