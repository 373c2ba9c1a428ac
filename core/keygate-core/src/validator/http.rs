//! HTTP validator: `GET {server}{validate_path}` with the secret as the
//! `Authorization` credential.
//!
//! Classification:
//! - 2xx → valid
//! - 401/403 → expired if the header or body says so, otherwise invalid
//! - 419/440 (session timeout codes) → expired
//! - 408/429/5xx, connect/DNS/timeout → transport error
//! - other 4xx → invalid

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use super::{RemoteValidator, Validation};
use crate::config::GateConfig;
use crate::error::GateError;
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};

static EXPIRED_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bexpired\b|token_expired|session_expired").expect("static regex")
});

const BODY_HINT_FIELDS: [&str; 4] = ["error", "error_description", "message", "code"];

/// Upper bound on how much of a 401/403 body is read for expiry hints.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub struct HttpValidator {
    client: Client,
    url: String,
    auth_scheme: String,
    retry: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl HttpValidator {
    pub fn from_config(config: &GateConfig) -> Result<Self, GateError> {
        if config.server_url.trim().is_empty() {
            return Err(GateError::InvalidServerUrl(String::new()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(concat!("keygate/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GateError::transport(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: config.validate_url(),
            auth_scheme: config.auth_scheme.clone(),
            retry: config.retry,
            sleeper: Arc::new(ThreadSleeper),
        })
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn validate_once(&self, secret: &str) -> Result<Validation, GateError> {
        let authorization = if self.auth_scheme.is_empty() {
            secret.to_string()
        } else {
            format!("{} {}", self.auth_scheme, secret)
        };

        let response = self
            .client
            .get(&self.url)
            .header(AUTHORIZATION, authorization)
            .send()
            .map_err(|e| GateError::transport(describe_send_error(&e)))?;

        let status = response.status().as_u16();
        let challenge = response
            .headers()
            .get(WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        // Only 401/403 need the body; everything else is decided by status.
        let body = if matches!(status, 401 | 403) {
            read_capped(response)
        } else {
            String::new()
        };

        classify(status, challenge.as_deref(), &body)
    }
}

impl RemoteValidator for HttpValidator {
    fn validate(&self, secret: &str) -> Result<Validation, GateError> {
        if secret.is_empty() {
            return Ok(Validation::Invalid);
        }
        let result = self
            .retry
            .run(self.sleeper.as_ref(), "credential validation", || {
                self.validate_once(secret)
            });
        match &result {
            Ok(validation) => tracing::debug!(url = %self.url, ?validation, "Credential classified"),
            Err(err) => tracing::warn!(url = %self.url, error = %err, "Credential validation failed"),
        }
        result
    }
}

fn read_capped(body: impl Read) -> String {
    let mut bytes = Vec::new();
    if let Err(e) = body.take(MAX_BODY_BYTES).read_to_end(&mut bytes) {
        tracing::debug!(error = %e, "Failed to read response body");
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn describe_send_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        format!("Request timed out: {err}")
    } else if err.is_connect() {
        format!("Connection failed: {err}")
    } else {
        format!("Request failed: {err}")
    }
}

pub(crate) fn classify(
    status: u16,
    challenge: Option<&str>,
    body: &str,
) -> Result<Validation, GateError> {
    match status {
        200..=299 => Ok(Validation::Valid),
        401 | 403 => {
            if says_expired(challenge, body) {
                Ok(Validation::Expired)
            } else {
                Ok(Validation::Invalid)
            }
        }
        419 | 440 => Ok(Validation::Expired),
        408 | 429 => Err(GateError::transport(format!(
            "Server asked to retry later (HTTP {status})"
        ))),
        500..=599 => Err(GateError::transport(format!("Server error (HTTP {status})"))),
        400..=499 => Ok(Validation::Invalid),
        _ => Err(GateError::transport(format!(
            "Unexpected response (HTTP {status})"
        ))),
    }
}

fn says_expired(challenge: Option<&str>, body: &str) -> bool {
    if challenge.is_some_and(|value| EXPIRED_PATTERN.is_match(value)) {
        return true;
    }

    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return false;
    };
    BODY_HINT_FIELDS.iter().any(|field| {
        json.get(*field)
            .and_then(|value| value.as_str())
            .is_some_and(|text| EXPIRED_PATTERN.is_match(text))
    })
}
