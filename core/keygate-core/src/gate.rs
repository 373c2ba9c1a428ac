//! Gate View
//!
//! Pure switch from [`SessionState`] to what the user sees. The only state it
//! holds is form input: the secret buffer and whether a submit is outstanding.
//! Every decision goes back to the [`SessionController`].

use std::fmt;

use crate::session::{ConfirmOutcome, SessionController, SessionState};

/// The static text of one form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormSpec {
    pub title: &'static str,
    pub message: &'static str,
    pub field_label: &'static str,
    pub submit_label: &'static str,
}

const SETUP_FORM: FormSpec = FormSpec {
    title: "Sign in",
    message: "No credential is stored for this server yet.",
    field_label: "Secret",
    submit_label: "Sign in",
};

const REAUTHENTICATE_FORM: FormSpec = FormSpec {
    title: "Session expired",
    message: "Your credential has expired. Enter it again to continue.",
    field_label: "Secret",
    submit_label: "Sign in again",
};

const UNLOCK_FORM: FormSpec = FormSpec {
    title: "Locked",
    message: "Enter your secret to unlock.",
    field_label: "Secret",
    submit_label: "Unlock",
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    /// Indeterminate progress. No affordances.
    Progress { message: &'static str },
    Setup(FormSpec),
    Reauthenticate(FormSpec),
    Unlock(FormSpec),
    /// Hand over to the protected content.
    Protected,
}

impl Screen {
    pub fn form(&self) -> Option<&FormSpec> {
        match self {
            Screen::Setup(form) | Screen::Reauthenticate(form) | Screen::Unlock(form) => Some(form),
            Screen::Progress { .. } | Screen::Protected => None,
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.form().is_some()
    }
}

pub fn screen_for(state: SessionState) -> Screen {
    match state {
        SessionState::Loading => Screen::Progress {
            message: "Checking credentials…",
        },
        SessionState::Missing => Screen::Setup(SETUP_FORM),
        SessionState::Expired => Screen::Reauthenticate(REAUTHENTICATE_FORM),
        SessionState::Locked => Screen::Unlock(UNLOCK_FORM),
        SessionState::Active => Screen::Protected,
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Screen::Progress { message } => write!(f, "⋯ {}", message),
            Screen::Protected => write!(f, "✓ Unlocked"),
            Screen::Setup(form) | Screen::Reauthenticate(form) | Screen::Unlock(form) => {
                writeln!(f, "{}", form.title)?;
                writeln!(f, "  {}", form.message)?;
                write!(f, "  [{}] → {}", form.field_label, form.submit_label)
            }
        }
    }
}

/// Secret input buffer. Never printed in clear.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct SecretField {
    buffer: String,
}

impl SecretField {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, c: char) {
        self.buffer.push(c);
    }

    pub fn push_str(&mut self, text: &str) {
        self.buffer.push_str(text);
    }

    pub fn backspace(&mut self) {
        self.buffer.pop();
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn masked(&self) -> String {
        "•".repeat(self.buffer.chars().count())
    }

    /// Empties the buffer, returning what it held.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }
}

impl fmt::Debug for SecretField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretField")
            .field("len", &self.buffer.chars().count())
            .finish()
    }
}

/// What [`Gate::render`] produced.
#[derive(Debug)]
pub enum GateOutput<T> {
    Screen(Screen),
    Protected(T),
}

impl<T> GateOutput<T> {
    pub fn is_protected(&self) -> bool {
        matches!(self, GateOutput::Protected(_))
    }
}

pub struct Gate<'a> {
    controller: &'a SessionController,
    field: SecretField,
    submitting: bool,
}

impl<'a> Gate<'a> {
    pub fn new(controller: &'a SessionController) -> Self {
        Self {
            controller,
            field: SecretField::new(),
            submitting: false,
        }
    }

    pub fn controller(&self) -> &'a SessionController {
        self.controller
    }

    pub fn field(&self) -> &SecretField {
        &self.field
    }

    pub fn field_mut(&mut self) -> &mut SecretField {
        &mut self.field
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn screen(&self) -> Screen {
        if self.submitting {
            return Screen::Progress {
                message: "Checking credentials…",
            };
        }
        let state = self.controller.state();
        if state == SessionState::Active && !self.controller.is_ready() {
            return Screen::Unlock(UNLOCK_FORM);
        }
        screen_for(state)
    }

    /// Runs `protected` only when the session is ready; otherwise returns the
    /// screen to show instead.
    pub fn render<T>(&self, protected: impl FnOnce() -> T) -> GateOutput<T> {
        match self.screen() {
            Screen::Protected => GateOutput::Protected(protected()),
            screen => GateOutput::Screen(screen),
        }
    }

    /// Takes the buffered secret and marks a submit outstanding. `None` while
    /// another submit is still outstanding or the form is not shown.
    pub fn begin_submit(&mut self) -> Option<String> {
        if self.submitting || !self.screen().is_interactive() {
            return None;
        }
        self.submitting = true;
        Some(self.field.take())
    }

    pub fn finish_submit(&mut self, _outcome: &ConfirmOutcome) {
        self.submitting = false;
    }

    /// Submits the buffered secret to the controller.
    pub fn submit(&mut self) -> Option<ConfirmOutcome> {
        let secret = self.begin_submit()?;
        let outcome = self.controller.confirm(&secret);
        self.finish_submit(&outcome);
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use crate::session::SessionSettings;
    use crate::store::MemoryCredentialStore;
    use crate::validator::{RemoteValidator, Validation};

    struct Always(Validation);

    impl RemoteValidator for Always {
        fn validate(&self, _secret: &str) -> Result<Validation, GateError> {
            Ok(self.0)
        }
    }

    fn controller(answer: Validation) -> SessionController {
        SessionController::new(
            MemoryCredentialStore::new(),
            Always(answer),
            SessionSettings::default(),
        )
    }

    #[test]
    fn each_state_has_its_screen() {
        assert!(matches!(
            screen_for(SessionState::Loading),
            Screen::Progress { .. }
        ));
        assert_eq!(screen_for(SessionState::Missing), Screen::Setup(SETUP_FORM));
        assert_eq!(
            screen_for(SessionState::Expired),
            Screen::Reauthenticate(REAUTHENTICATE_FORM)
        );
        assert_eq!(screen_for(SessionState::Locked), Screen::Unlock(UNLOCK_FORM));
        assert_eq!(screen_for(SessionState::Active), Screen::Protected);
    }

    #[test]
    fn expired_and_setup_read_differently() {
        let expired = screen_for(SessionState::Expired).to_string();
        let setup = screen_for(SessionState::Missing).to_string();
        assert!(expired.contains("expired"));
        assert!(!setup.contains("expired"));
    }

    #[test]
    fn loading_has_no_affordances() {
        assert!(!screen_for(SessionState::Loading).is_interactive());
    }

    #[test]
    fn secret_field_is_masked() {
        let mut field = SecretField::new();
        field.push_str("hunter");
        field.push('2');
        field.backspace();
        assert_eq!(field.masked(), "••••••");
        assert!(!format!("{:?}", field).contains("hunter"));
        assert_eq!(field.take(), "hunter");
        assert!(field.is_empty());
    }

    #[test]
    fn protected_content_only_renders_when_ready() {
        let controller = controller(Validation::Valid);
        controller.initialize();
        let mut gate = Gate::new(&controller);

        let before = gate.render(|| "account");
        assert!(!before.is_protected());

        gate.field_mut().push_str("s3cret");
        assert_eq!(gate.submit(), Some(ConfirmOutcome::Accepted));
        assert!(matches!(gate.render(|| "account"), GateOutput::Protected("account")));
    }

    #[test]
    fn duplicate_submit_is_rejected_while_outstanding() {
        let controller = controller(Validation::Invalid);
        controller.initialize();
        let mut gate = Gate::new(&controller);

        gate.field_mut().push_str("s3cret");
        assert_eq!(gate.begin_submit().as_deref(), Some("s3cret"));
        assert!(gate.begin_submit().is_none());
        assert!(matches!(gate.screen(), Screen::Progress { .. }));

        let outcome = controller.confirm("s3cret");
        gate.finish_submit(&outcome);
        assert!(!gate.is_submitting());
        assert_eq!(gate.screen(), Screen::Setup(SETUP_FORM));
    }
}
