//! keygate: command-line client for a gated session.
//!
//! Stores a credential, confirms it against the configured server, and shows
//! either the account summary or the screen asking for the secret.
//!
//! ## Subcommands
//!
//! - `status`: validate the stored credential and show the gate
//! - `login` / `unlock`: read a secret from stdin and confirm it
//! - `lock` / `logout`: drop the session (logout also clears the store)
//! - `retry`: re-validate after a transport failure
//! - `config show` / `config set-server <url>`
//!
//! Exit codes: 0 success, 1 session not ready or action failed, 2 configuration error.

mod logging;
mod session;
mod settings;

use clap::{Parser, Subcommand};
use keygate_core::{ErrorKind, GateError, StorageConfig};
use std::io;
use std::process::ExitCode;

use session::Action;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("Failed to read secret from stdin: {0}")]
    Stdin(#[source] io::Error),

    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("Keyring store selected but keygate was built without the `keyring` feature")]
    KeyringUnavailable,
}

impl CliError {
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Gate(err) if err.kind() == ErrorKind::Config => 2,
            CliError::KeyringUnavailable => 2,
            _ => 1,
        }
    }
}

#[derive(Parser)]
#[command(name = "keygate")]
#[command(about = "Gated session client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the stored credential and show the gate
    Status,

    /// Sign in with a new secret (read from stdin)
    Login,

    /// Unlock with the stored account's secret (read from stdin)
    Unlock,

    /// Lock the session
    Lock {
        /// Recorded in the log and passed to listeners
        #[arg(long)]
        reason: Option<String>,
    },

    /// Sign out and clear stored credentials
    Logout {
        #[arg(long)]
        reason: Option<String>,
    },

    /// Re-validate after the server could not be reached
    Retry,

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Set the validation server base URL
    SetServer {
        #[arg(value_name = "URL")]
        url: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let storage = StorageConfig::from_env();
    let _logging_guard = logging::init(storage.as_ref().ok().map(|s| s.logs_dir()).as_deref());

    match run(cli.command, storage) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            tracing::error!(error = %err, "keygate failed");
            eprintln!("keygate: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run(command: Commands, storage: keygate_core::Result<StorageConfig>) -> Result<bool, CliError> {
    let action = match command {
        Commands::Status => Action::Status,
        Commands::Login => Action::Login,
        Commands::Unlock => Action::Unlock,
        Commands::Lock { reason } => Action::Lock { reason },
        Commands::Logout { reason } => Action::Logout { reason },
        Commands::Retry => Action::Retry,
        Commands::Config { command } => {
            let storage = storage?;
            let mut out = io::stdout().lock();
            match command {
                ConfigCommands::Show => settings::show(&storage, &mut out)?,
                ConfigCommands::SetServer { url } => settings::set_server(&storage, &url, &mut out)?,
            }
            return Ok(true);
        }
    };
    session::run(&storage?, action)
}
