use serde::{Deserialize, Serialize};
use std::fmt;

/// UI-relevant session state. Derived, never persisted as the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Loading,
    Missing,
    Expired,
    Locked,
    Active,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Loading => "loading",
            SessionState::Missing => "missing",
            SessionState::Expired => "expired",
            SessionState::Locked => "locked",
            SessionState::Active => "active",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "loading" => Some(SessionState::Loading),
            "missing" => Some(SessionState::Missing),
            "expired" => Some(SessionState::Expired),
            "locked" => Some(SessionState::Locked),
            "active" => Some(SessionState::Active),
            _ => None,
        }
    }

    /// Everything except `loading`.
    pub fn is_settled(self) -> bool {
        !matches!(self, SessionState::Loading)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeStyle {
    Success,
    Failure,
    Info,
}

/// The actionable next step a notice offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeAction {
    /// Try the same thing again; the credential itself may be fine.
    Retry,
    /// Enter the secret again.
    Reenter,
    /// Fix the configuration (server URL, store backend).
    OpenSettings,
}

/// A toast-style message queued by the controller for the view to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub style: NoticeStyle,
    pub title: String,
    pub message: Option<String>,
    pub action: Option<NoticeAction>,
}

impl Notice {
    pub(crate) fn unreachable(message: &str) -> Self {
        Notice {
            style: NoticeStyle::Failure,
            title: "Could not reach the server".to_string(),
            message: Some(message.to_string()),
            action: Some(NoticeAction::Retry),
        }
    }

    pub(crate) fn misconfigured(message: &str) -> Self {
        Notice {
            style: NoticeStyle::Failure,
            title: "Validation is not configured".to_string(),
            message: Some(message.to_string()),
            action: Some(NoticeAction::OpenSettings),
        }
    }

    pub(crate) fn rejected(expired: bool) -> Self {
        Notice {
            style: NoticeStyle::Failure,
            title: if expired {
                "Credential expired".to_string()
            } else {
                "Invalid credentials".to_string()
            },
            message: None,
            action: Some(NoticeAction::Reenter),
        }
    }

    pub(crate) fn empty_secret() -> Self {
        Notice {
            style: NoticeStyle::Failure,
            title: "A secret is required".to_string(),
            message: None,
            action: Some(NoticeAction::Reenter),
        }
    }

    pub(crate) fn unlocked() -> Self {
        Notice {
            style: NoticeStyle::Success,
            title: "Unlocked".to_string(),
            message: None,
            action: None,
        }
    }

    pub(crate) fn info(title: &str, message: &str) -> Self {
        Notice {
            style: NoticeStyle::Info,
            title: title.to_string(),
            message: Some(message.to_string()),
            action: None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.style {
            NoticeStyle::Success => "✓",
            NoticeStyle::Failure => "✗",
            NoticeStyle::Info => "•",
        };
        write!(f, "{} {}", marker, self.title)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Result of [`super::SessionController::confirm`]. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Accepted,
    Rejected { expired: bool },
    /// The validator could not be reached; state unchanged.
    Unreachable { message: String },
    /// Nothing to validate.
    Empty,
    /// The view unmounted while the request was outstanding.
    Discarded,
}

impl ConfirmOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ConfirmOutcome::Accepted)
    }
}

/// Observer for session transitions. Called after the transition is applied,
/// outside the controller's internal locks.
pub trait SessionListener: Send + Sync {
    fn on_state_change(&self, _from: SessionState, _to: SessionState) {}

    fn on_unlock(&self) {}

    fn on_lock(&self, _reason: Option<&str>) {}

    fn on_logout(&self, _reason: Option<&str>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names_round_trip() {
        for state in [
            SessionState::Loading,
            SessionState::Missing,
            SessionState::Expired,
            SessionState::Locked,
            SessionState::Active,
        ] {
            assert_eq!(SessionState::parse(state.as_str()), Some(state));
        }
        assert_eq!(SessionState::parse("unlocked"), None);
    }

    #[test]
    fn unreachable_notice_offers_retry() {
        let notice = Notice::unreachable("connection refused");
        assert_eq!(notice.action, Some(NoticeAction::Retry));
        assert_eq!(
            notice.to_string(),
            "✗ Could not reach the server: connection refused"
        );
    }
}
