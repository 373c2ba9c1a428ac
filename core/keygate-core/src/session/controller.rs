//! The session state machine.
//!
//! Owns the credential store and the validator. Every transition goes through
//! here; views only read [`SessionController::state`] / [`SessionController::is_ready`]
//! and call the action methods.
//!
//! ## Ordering
//!
//! - `confirm`, `lock`, `logout`, `refresh`, `touch` and the body of
//!   `initialize` run under one action lock, so store writes never interleave.
//! - `initialize` is coalesced: a call while one is running (or after one
//!   finished in the same mount) returns the current state without touching
//!   the validator.
//! - `mount`/`unmount` bump an epoch. A result computed under an older epoch is
//!   dropped on arrival instead of being applied to a view that went away.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tracing::{debug, info, warn};

use super::transition::{locked_state, next_state, ValidatorResult};
use super::types::{ConfirmOutcome, Notice, SessionListener, SessionState};
use crate::clock::{Clock, SystemClock};
use crate::config::{GateConfig, LockPolicy, TransportFailurePolicy};
use crate::credential::{self, load_record, CredentialRecord};
use crate::error::ErrorKind;
use crate::store::{keys, CredentialStore};
use crate::validator::{RemoteValidator, Validation};

/// The policy subset of [`GateConfig`] the controller needs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSettings {
    /// Normalized server URL; records issued against another server are signed out.
    /// Empty disables the check.
    pub server_url: String,
    pub lock_policy: LockPolicy,
    pub transport_failure: TransportFailurePolicy,
    pub reprompt_window_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

impl From<&GateConfig> for SessionSettings {
    fn from(config: &GateConfig) -> Self {
        Self {
            server_url: config.normalized_server_url(),
            lock_policy: config.lock_policy,
            transport_failure: config.transport_failure,
            reprompt_window_secs: config.reprompt_window_secs,
            idle_timeout_secs: config.idle_timeout_secs,
        }
    }
}

/// Read-only view of the session for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub ready: bool,
    pub last_known: Option<SessionState>,
    pub issued_at: Option<DateTime<Utc>>,
    pub last_confirmed_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub server_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitPhase {
    Idle,
    Running,
    Done,
}

struct Inner {
    state: SessionState,
    last_known: Option<SessionState>,
    secret: Option<String>,
    epoch: u64,
    mount: u64,
    mounted: bool,
    init: InitPhase,
    notices: Vec<Notice>,
}

enum Event {
    Unlock,
    Lock(Option<String>),
    Logout(Option<String>),
}

struct Resolution {
    state: SessionState,
    secret: Option<String>,
    notices: Vec<Notice>,
    events: Vec<Event>,
}

impl Resolution {
    fn settled(state: SessionState) -> Self {
        Self {
            state,
            secret: None,
            notices: Vec::new(),
            events: Vec::new(),
        }
    }
}

pub struct SessionController {
    store: Box<dyn CredentialStore>,
    validator: Box<dyn RemoteValidator>,
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    inner: Mutex<Inner>,
    actions: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn SessionListener>>>,
}

impl SessionController {
    /// Creates a controller in the `loading` state, already mounted.
    pub fn new<S, V>(store: S, validator: V, settings: SessionSettings) -> Self
    where
        S: CredentialStore + 'static,
        V: RemoteValidator + 'static,
    {
        Self {
            store: Box::new(store),
            validator: Box::new(validator),
            clock: Arc::new(SystemClock),
            settings,
            inner: Mutex::new(Inner {
                state: SessionState::Loading,
                last_known: None,
                secret: None,
                epoch: 0,
                mount: 1,
                mounted: true,
                init: InitPhase::Idle,
                notices: Vec::new(),
            }),
            actions: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn add_listener(&self, listener: Arc<dyn SessionListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Observers
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.inner().state
    }

    /// The gate: true only while active with a confirmed secret in memory.
    pub fn is_ready(&self) -> bool {
        let inner = self.inner();
        inner.state == SessionState::Active && inner.secret.is_some()
    }

    /// The confirmed secret, only while ready.
    pub fn session_secret(&self) -> Option<String> {
        let inner = self.inner();
        if inner.state == SessionState::Active {
            inner.secret.clone()
        } else {
            None
        }
    }

    /// Drains queued notices, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        std::mem::take(&mut self.inner().notices)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let record = load_record(self.store.as_ref());
        let inner = self.inner();
        SessionSnapshot {
            state: inner.state,
            ready: inner.state == SessionState::Active && inner.secret.is_some(),
            last_known: inner.last_known,
            issued_at: record.issued_at,
            last_confirmed_at: record.last_confirmed_at,
            last_activity_at: record.last_activity_at,
            server_url: record.server_url,
        }
    }

    /// Whether a protected action must ask for the secret again.
    pub fn needs_reprompt(&self) -> bool {
        if !self.is_ready() {
            return true;
        }
        let record = load_record(self.store.as_ref());
        !record.within_reprompt_window(self.clock.now(), self.settings.reprompt_window_secs)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts a new mount: back to `loading`, and `initialize` may run again.
    pub fn mount(&self) {
        let mut inner = self.inner();
        inner.mount += 1;
        inner.mounted = true;
        inner.init = InitPhase::Idle;
        inner.epoch += 1;
        inner.state = SessionState::Loading;
        debug!(mount = inner.mount, "Session view mounted");
    }

    /// Ends the current mount. Outstanding results are dropped when they arrive.
    pub fn unmount(&self) {
        let mut inner = self.inner();
        inner.mounted = false;
        inner.epoch += 1;
        debug!(mount = inner.mount, "Session view unmounted");
    }

    /// Loads the store, validates, and settles the state. Once per mount.
    pub fn initialize(&self) -> SessionState {
        let mount = {
            let mut inner = self.inner();
            if !inner.mounted {
                debug!("initialize() while unmounted, ignoring");
                return inner.state;
            }
            if inner.init != InitPhase::Idle {
                debug!(phase = ?inner.init, "initialize() coalesced");
                return inner.state;
            }
            inner.init = InitPhase::Running;
            inner.mount
        };

        let _action = self.actions();
        self.resolve_and_apply(mount)
    }

    /// Explicit user retry, e.g. after a transport failure.
    pub fn refresh(&self) -> SessionState {
        let _action = self.actions();
        let mount = {
            let mut inner = self.inner();
            if !inner.mounted {
                return inner.state;
            }
            inner.state = SessionState::Loading;
            inner.mount
        };
        self.resolve_and_apply(mount)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Validates a freshly entered secret. On success the secret is persisted
    /// and the session becomes active; otherwise state is left as it was and a
    /// notice explains why.
    pub fn confirm(&self, secret: &str) -> ConfirmOutcome {
        if secret.is_empty() {
            self.inner().notices.push(Notice::empty_secret());
            return ConfirmOutcome::Empty;
        }

        let _action = self.actions();
        let epoch = self.inner().epoch;
        let result = self.validator.validate(secret);

        // Epoch check and transition share one guard so an unmount cannot
        // land between them.
        let mut inner = self.inner();
        if inner.epoch != epoch {
            debug!("Discarding confirm result for a stale view");
            return ConfirmOutcome::Discarded;
        }

        match result {
            Ok(Validation::Valid) => {
                let from = inner.state;
                inner.epoch += 1;
                inner.state = SessionState::Active;
                inner.secret = Some(secret.to_string());
                inner.last_known = Some(SessionState::Active);
                if inner.init == InitPhase::Idle {
                    inner.init = InitPhase::Done;
                }
                inner.notices.push(Notice::unlocked());
                drop(inner);

                info!(from = %from, "Session unlocked");
                self.persist_confirmed(secret, self.clock.now());
                self.persist_status(SessionState::Active);
                self.notify(from, SessionState::Active, &[Event::Unlock]);
                ConfirmOutcome::Accepted
            }
            Ok(rejected) => {
                let expired = rejected == Validation::Expired;
                info!(expired, "Credential rejected");
                inner.notices.push(Notice::rejected(expired));
                ConfirmOutcome::Rejected { expired }
            }
            Err(err) => {
                let message = err.to_string();
                let notice = if err.kind() == ErrorKind::Transport {
                    Notice::unreachable(&message)
                } else {
                    Notice::misconfigured(&message)
                };
                inner.notices.push(notice);
                ConfirmOutcome::Unreachable { message }
            }
        }
    }

    /// Drops the ready flag and the in-memory secret. What happens to the
    /// stored secret depends on [`LockPolicy`].
    pub fn lock(&self, reason: Option<&str>) -> SessionState {
        let _action = self.actions();
        let record = load_record(self.store.as_ref());
        if record.exists() {
            self.apply_lock_policy(self.clock.now());
        }
        let target = locked_state(record.exists());

        let from = {
            let mut inner = self.inner();
            let from = inner.state;
            inner.epoch += 1;
            inner.secret = None;
            inner.state = target;
            inner.last_known = Some(target);
            from
        };

        info!(from = %from, to = %target, reason = reason.unwrap_or("-"), "Session locked");
        let mut events = Vec::new();
        if target == SessionState::Locked {
            self.persist_status(target);
            events.push(Event::Lock(reason.map(str::to_string)));
        }
        self.notify(from, target, &events);
        target
    }

    /// Clears the store entirely.
    pub fn logout(&self, reason: Option<&str>) -> SessionState {
        let _action = self.actions();
        credential::wipe(self.store.as_ref());

        let from = {
            let mut inner = self.inner();
            let from = inner.state;
            inner.epoch += 1;
            inner.secret = None;
            inner.state = SessionState::Missing;
            inner.last_known = Some(SessionState::Missing);
            from
        };

        info!(from = %from, reason = reason.unwrap_or("-"), "Session logged out");
        self.notify(
            from,
            SessionState::Missing,
            &[Event::Logout(reason.map(str::to_string))],
        );
        SessionState::Missing
    }

    /// Records activity for the idle timeout. No-op unless active.
    pub fn touch(&self) {
        let _action = self.actions();
        if self.state() == SessionState::Active {
            credential::put_time(
                self.store.as_ref(),
                keys::LAST_ACTIVITY_AT,
                self.clock.now(),
            );
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────────

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn actions(&self) -> MutexGuard<'_, ()> {
        self.actions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Caller holds the action lock.
    fn resolve_and_apply(&self, mount: u64) -> SessionState {
        let epoch = {
            let inner = self.inner();
            if inner.mount != mount {
                return inner.state;
            }
            inner.epoch
        };

        let resolution = self.resolve();

        let (from, to, events) = {
            let mut inner = self.inner();
            if inner.mount == mount {
                inner.init = InitPhase::Done;
            }
            if inner.epoch != epoch {
                debug!(state = %resolution.state, "Discarding stale session resolution");
                return inner.state;
            }

            let from = inner.state;
            let to = resolution.state;
            inner.epoch += 1;
            inner.state = to;
            if to == SessionState::Active {
                if let Some(secret) = resolution.secret {
                    inner.secret = Some(secret);
                }
            } else {
                inner.secret = None;
            }
            inner.last_known = Some(to);
            inner.notices.extend(resolution.notices);
            (from, to, resolution.events)
        };

        debug!(from = %from, to = %to, "Session resolved");
        if to != SessionState::Missing {
            self.persist_status(to);
        }
        self.notify(from, to, &events);
        to
    }

    /// Reads the store and asks the validator. Writes only what the outcome
    /// requires (server change, idle lock, activity time).
    fn resolve(&self) -> Resolution {
        let now = self.clock.now();
        let store = self.store.as_ref();
        let record = load_record(store);

        if !record.exists() {
            return Resolution::settled(SessionState::Missing);
        }

        if let Some(stored) = record.server_url.as_deref() {
            if !self.settings.server_url.is_empty() && stored != self.settings.server_url {
                info!(
                    stored = %stored,
                    configured = %self.settings.server_url,
                    "Server changed, signing out"
                );
                credential::wipe(store);
                return Resolution {
                    state: SessionState::Missing,
                    secret: None,
                    notices: vec![Notice::info(
                        "Server changed",
                        &format!("Signed out of {}", stored),
                    )],
                    events: vec![Event::Logout(Some("server changed".to_string()))],
                };
            }
        }

        let secret = match (&record.secret, record.is_locked()) {
            (Some(secret), false) => secret.clone(),
            _ => {
                return Resolution::settled(self.next_state(&record, ValidatorResult::NotAttempted))
            }
        };

        if record.idle_expired(now, self.settings.idle_timeout_secs) {
            info!("Idle timeout elapsed, locking");
            self.apply_lock_policy(now);
            return Resolution {
                state: SessionState::Locked,
                secret: None,
                notices: vec![Notice::info("Locked", "Locked after a period of inactivity")],
                events: vec![Event::Lock(Some("idle timeout".to_string()))],
            };
        }

        let mut notices = Vec::new();
        let result = match self.validator.validate(&secret) {
            Ok(Validation::Valid) => {
                credential::put_time(store, keys::LAST_ACTIVITY_AT, now);
                ValidatorResult::Valid
            }
            Ok(Validation::Invalid) => ValidatorResult::Invalid,
            Ok(Validation::Expired) => ValidatorResult::Expired,
            Err(err) => {
                warn!(error = %err, "Validator unreachable during session resolution");
                notices.push(if err.kind() == ErrorKind::Transport {
                    Notice::unreachable(&err.to_string())
                } else {
                    Notice::misconfigured(&err.to_string())
                });
                ValidatorResult::Unreachable
            }
        };

        let state = self.next_state(&record, result);
        // A kept `active` after a transport failure unlocks with the stored secret.
        let confirmed = result == ValidatorResult::Valid
            || (result == ValidatorResult::Unreachable && state == SessionState::Active);
        Resolution {
            state,
            secret: confirmed.then_some(secret),
            notices,
            events: Vec::new(),
        }
    }

    /// Falls back to the persisted `last_status` when this process has not
    /// settled yet, so a fresh process keeps the previous run's state.
    fn next_state(&self, record: &CredentialRecord, result: ValidatorResult) -> SessionState {
        let last_known = self.inner().last_known.or_else(|| {
            record
                .last_status
                .as_deref()
                .and_then(SessionState::parse)
        });
        next_state(record, result, last_known, self.settings.transport_failure)
    }

    fn apply_lock_policy(&self, now: DateTime<Utc>) {
        let store = self.store.as_ref();
        if self.settings.lock_policy == LockPolicy::ClearSecret {
            credential::drop_key(store, keys::SECRET);
        }
        credential::drop_key(store, keys::LAST_CONFIRMED_AT);
        credential::put_time(store, keys::LOCKED_AT, now);
    }

    fn persist_confirmed(&self, secret: &str, now: DateTime<Utc>) {
        let store = self.store.as_ref();
        let record = load_record(store);
        if record.secret.as_deref() != Some(secret) || record.issued_at.is_none() {
            credential::put_time(store, keys::ISSUED_AT, now);
        }
        credential::put(store, keys::SECRET, secret);
        credential::put_time(store, keys::LAST_CONFIRMED_AT, now);
        credential::put_time(store, keys::LAST_ACTIVITY_AT, now);
        credential::drop_key(store, keys::LOCKED_AT);
        if !self.settings.server_url.is_empty() {
            credential::put(store, keys::SERVER_URL, &self.settings.server_url);
        }
    }

    fn persist_status(&self, state: SessionState) {
        credential::put(self.store.as_ref(), keys::LAST_STATUS, state.as_str());
    }

    fn notify(&self, from: SessionState, to: SessionState, events: &[Event]) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if listeners.is_empty() {
            return;
        }

        for listener in &listeners {
            if from != to {
                listener.on_state_change(from, to);
            }
            for event in events {
                match event {
                    Event::Unlock => listener.on_unlock(),
                    Event::Lock(reason) => listener.on_lock(reason.as_deref()),
                    Event::Logout(reason) => listener.on_logout(reason.as_deref()),
                }
            }
        }
    }
}
