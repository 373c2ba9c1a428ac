//! Bounded retry for transport failures.
//!
//! Only transport errors are retried; a rejected credential is an answer, not
//! a failure. Sleeping goes through [`Sleeper`] so tests never wait on real time.

use serde::{Deserialize, Serialize};
use std::cmp;
use std::thread;
use std::time::Duration;

use crate::error::{ErrorKind, GateError};

const DEFAULT_BACKOFF_MS: u64 = 250;
const DEFAULT_MAX_BACKOFF_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retry.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each subsequent retry.
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff_ms: DEFAULT_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self::default()
    }

    pub fn with_attempts(max_attempts: u32, backoff_ms: u64) -> Self {
        Self {
            max_attempts,
            backoff_ms,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        let delay = self.backoff_ms.saturating_mul(1u64 << exponent);
        Duration::from_millis(cmp::min(delay, self.max_backoff_ms))
    }

    /// Runs `op` until it succeeds, fails with a non-transport error, or the
    /// attempt budget is spent.
    pub fn run<T, F>(&self, sleeper: &dyn Sleeper, label: &str, mut op: F) -> Result<T, GateError>
    where
        F: FnMut() -> Result<T, GateError>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.kind() == ErrorKind::Transport && attempt < attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        error = %err,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "{} failed, retrying",
                        label
                    );
                    sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: Mutex<Vec<Duration>>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            backoff_ms: 100,
            max_backoff_ms: 500,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(60), Duration::from_millis(500));
    }

    #[test]
    fn retries_transport_errors_until_budget_spent() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::with_attempts(3, 10);
        let mut calls = 0;

        let result: Result<(), GateError> = policy.run(&sleeper, "validate", || {
            calls += 1;
            Err(GateError::transport("connection refused"))
        });

        assert!(matches!(result, Err(GateError::Transport { .. })));
        assert_eq!(calls, 3);
        assert_eq!(
            *sleeper.delays.lock().unwrap(),
            vec![Duration::from_millis(10), Duration::from_millis(20)]
        );
    }

    #[test]
    fn stops_on_first_success() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::with_attempts(5, 10);
        let mut calls = 0;

        let result = policy.run(&sleeper, "validate", || {
            calls += 1;
            if calls < 2 {
                Err(GateError::transport("timeout"))
            } else {
                Ok("ok")
            }
        });

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 2);
        assert_eq!(sleeper.delays.lock().unwrap().len(), 1);
    }

    #[test]
    fn does_not_retry_rejections() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::with_attempts(5, 10);
        let mut calls = 0;

        let result: Result<(), GateError> = policy.run(&sleeper, "validate", || {
            calls += 1;
            Err(GateError::Rejected { expired: false })
        });

        assert!(matches!(result, Err(GateError::Rejected { .. })));
        assert_eq!(calls, 1);
        assert!(sleeper.delays.lock().unwrap().is_empty());
    }

    #[test]
    fn zero_attempts_still_runs_once() {
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::with_attempts(0, 10);
        let mut calls = 0;
        let _ = policy.run(&sleeper, "validate", || -> Result<(), GateError> {
            calls += 1;
            Err(GateError::transport("dns"))
        });
        assert_eq!(calls, 1);
    }
}
