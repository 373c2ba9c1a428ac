//! Log setup: daily rolling file under `~/.keygate/logs`.
//!
//! `KEYGATE_DEBUG_LOG=1` forces debug level; otherwise `RUST_LOG`, then `info`
//! (`warn` when falling back to stderr). Stdout stays clean for command output.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const DEBUG_LOG_ENV: &str = "KEYGATE_DEBUG_LOG";

const LOG_FILE_PREFIX: &str = "keygate.log";

/// Installs the global subscriber. Keep the guard alive until exit so
/// buffered lines are flushed.
pub fn init(logs_dir: Option<&Path>) -> Option<WorkerGuard> {
    let debug = env::var(DEBUG_LOG_ENV).ok();
    let rust_log = env::var(EnvFilter::DEFAULT_ENV).ok();

    // Without a log directory, lines go to stderr; quieter by default there.
    let Some(dir) = logs_dir.filter(|dir| fs_err::create_dir_all(dir).is_ok()) else {
        let directive = filter_directive(debug.as_deref(), rust_log.as_deref(), "warn");
        let _ = tracing_subscriber::fmt()
            .with_env_filter(build_filter(&directive))
            .with_writer(std::io::stderr)
            .try_init();
        return None;
    };

    let directive = filter_directive(debug.as_deref(), rust_log.as_deref(), "info");
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let installed = tracing_subscriber::fmt()
        .with_env_filter(build_filter(&directive))
        .with_writer(writer)
        .with_ansi(false)
        .try_init();

    installed.ok().map(|_| guard)
}

/// `KEYGATE_DEBUG_LOG` wins, then a non-empty `RUST_LOG`, then `default`.
fn filter_directive(debug: Option<&str>, rust_log: Option<&str>, default: &str) -> String {
    if debug_enabled(debug) {
        return "debug".to_string();
    }
    match rust_log.map(str::trim) {
        Some(directive) if !directive.is_empty() => directive.to_string(),
        _ => default.to_string(),
    }
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn debug_enabled(value: Option<&str>) -> bool {
    matches!(value, Some("1" | "true" | "TRUE" | "yes" | "YES"))
}
