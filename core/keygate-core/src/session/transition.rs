//! Maps (stored record, validator result) to a session state.
//! Conservative rules: a secret is only `active` on a fresh `Valid`.

use super::types::SessionState;
use crate::config::TransportFailurePolicy;
use crate::credential::CredentialRecord;

/// What the validator said about the stored secret, if it was asked at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorResult {
    /// No request was made (no secret, locked marker, idle timeout).
    NotAttempted,
    Valid,
    Invalid,
    Expired,
    Unreachable,
}

pub fn next_state(
    record: &CredentialRecord,
    result: ValidatorResult,
    last_known: Option<SessionState>,
    on_unreachable: TransportFailurePolicy,
) -> SessionState {
    if !record.exists() {
        return SessionState::Missing;
    }

    match result {
        ValidatorResult::Valid if record.secret.is_some() => SessionState::Active,
        ValidatorResult::Valid | ValidatorResult::NotAttempted | ValidatorResult::Invalid => {
            SessionState::Locked
        }
        ValidatorResult::Expired => SessionState::Expired,
        ValidatorResult::Unreachable => match on_unreachable {
            TransportFailurePolicy::Lock => SessionState::Locked,
            TransportFailurePolicy::KeepLastKnown => last_known
                .filter(|state| state.is_settled() && *state != SessionState::Missing)
                .unwrap_or(SessionState::Locked),
        },
    }
}

/// State after an explicit lock: nothing to lock without a record.
pub fn locked_state(record_exists: bool) -> SessionState {
    if record_exists {
        SessionState::Locked
    } else {
        SessionState::Missing
    }
}
