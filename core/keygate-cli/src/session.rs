//! Session commands: status, login/unlock, lock, logout, retry.
//!
//! Each command builds a fresh controller (one mount), runs one action and
//! prints the resulting gate screen plus any queued notices.

use std::io::{self, BufRead, IsTerminal, Write};

use chrono::{DateTime, Local, Utc};
use keygate_core::{
    load_config, ConfirmOutcome, CredentialStore, FileCredentialStore, Gate, GateConfig,
    GateError, GateOutput, HttpValidator, Notice, NoticeAction, RemoteValidator, Screen,
    SessionController, SessionSettings, SessionSnapshot, StorageConfig, StoreBackend, Validation,
};

use crate::CliError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Status,
    Login,
    Unlock,
    Lock { reason: Option<String> },
    Logout { reason: Option<String> },
    Retry,
}

/// Returns whether the command succeeded (`false` maps to exit code 1).
pub fn run(storage: &StorageConfig, action: Action) -> Result<bool, CliError> {
    let config = load_config(storage);
    let controller = build_controller(storage, &config)?;

    let stdin = io::stdin();
    let stdout = io::stdout();
    run_with(&controller, action, &mut stdin.lock(), &mut stdout.lock())
}

pub fn build_controller(
    storage: &StorageConfig,
    config: &GateConfig,
) -> Result<SessionController, CliError> {
    let store = open_store(storage, config)?;
    let settings = SessionSettings::from(config);

    let controller = match HttpValidator::from_config(config) {
        Ok(validator) => SessionController::new(store, validator, settings),
        Err(err) => {
            tracing::warn!(error = %err, "Validator not configured");
            SessionController::new(store, Unconfigured, settings)
        }
    };
    Ok(controller)
}

fn open_store(
    storage: &StorageConfig,
    config: &GateConfig,
) -> Result<Box<dyn CredentialStore>, CliError> {
    match config.store {
        StoreBackend::File => Ok(Box::new(FileCredentialStore::new(
            &storage.credentials_file(),
        ))),
        #[cfg(feature = "keyring")]
        StoreBackend::Keyring => Ok(Box::new(keyring_store())),
        #[cfg(not(feature = "keyring"))]
        StoreBackend::Keyring => Err(CliError::KeyringUnavailable),
    }
}

/// The same keyring entry whatever server is configured.
#[cfg(feature = "keyring")]
fn keyring_store() -> keygate_core::KeyringCredentialStore {
    keygate_core::KeyringCredentialStore::new(
        keygate_core::DEFAULT_SERVICE,
        keygate_core::DEFAULT_ACCOUNT,
    )
}

/// Stands in for the HTTP validator until a server URL is configured.
struct Unconfigured;

impl RemoteValidator for Unconfigured {
    fn validate(&self, _secret: &str) -> Result<Validation, GateError> {
        Err(GateError::InvalidServerUrl("no server configured".to_string()))
    }
}

pub fn run_with(
    controller: &SessionController,
    action: Action,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<bool, CliError> {
    let ok = match action {
        Action::Status => {
            controller.initialize();
            controller.touch();
            controller.is_ready()
        }
        Action::Login | Action::Unlock => {
            controller.initialize();
            let mut gate = Gate::new(controller);
            match gate.screen() {
                Screen::Protected => {
                    writeln!(out, "Already unlocked")?;
                    true
                }
                screen => {
                    let label = screen.form().map(|form| form.field_label).unwrap_or("Secret");
                    if io::stdin().is_terminal() {
                        eprint!("{}: ", label);
                    }
                    gate.field_mut().push_str(&read_secret(input)?);
                    matches!(gate.submit(), Some(ConfirmOutcome::Accepted))
                }
            }
        }
        Action::Lock { reason } => {
            controller.lock(reason.as_deref());
            true
        }
        Action::Logout { reason } => {
            controller.logout(reason.as_deref());
            true
        }
        Action::Retry => {
            controller.refresh();
            controller.is_ready()
        }
    };

    print_notices(controller.take_notices(), out)?;
    print_gate(controller, out)?;
    Ok(ok)
}

fn read_secret(input: &mut impl BufRead) -> Result<String, CliError> {
    let mut line = String::new();
    input.read_line(&mut line).map_err(CliError::Stdin)?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn print_gate(controller: &SessionController, out: &mut impl Write) -> io::Result<()> {
    let gate = Gate::new(controller);
    match gate.render(|| account_summary(&controller.snapshot())) {
        GateOutput::Protected(summary) => writeln!(out, "{}", summary),
        GateOutput::Screen(screen) => writeln!(out, "{}", screen),
    }
}

fn account_summary(snapshot: &SessionSnapshot) -> String {
    let mut lines = vec!["✓ Unlocked".to_string()];
    if let Some(server) = &snapshot.server_url {
        lines.push(format!("  server:    {}", server));
    }
    if let Some(at) = snapshot.issued_at {
        lines.push(format!("  signed in: {}", local_time(at)));
    }
    if let Some(at) = snapshot.last_confirmed_at {
        lines.push(format!("  confirmed: {}", local_time(at)));
    }
    lines.join("\n")
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn print_notices(notices: Vec<Notice>, out: &mut impl Write) -> io::Result<()> {
    for notice in notices {
        match notice.action.map(hint) {
            Some(hint) => writeln!(out, "{} ({})", notice, hint)?,
            None => writeln!(out, "{}", notice)?,
        }
    }
    Ok(())
}

fn hint(action: NoticeAction) -> &'static str {
    match action {
        NoticeAction::Retry => "run `keygate retry`",
        NoticeAction::Reenter => "run `keygate unlock`",
        NoticeAction::OpenSettings => "run `keygate config set-server <url>`",
    }
}
