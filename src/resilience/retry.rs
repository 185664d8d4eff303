//! Retrying caller.
//!
//! Wraps one remote call with bounded retries. Only transient failures
//! ([`crate::Error::is_transient`]) are retried; the backoff between attempts is the
//! rate-limit quota period so a throttled caller waits for the window to slide.

use crate::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Total attempts (first call included) before a transient failure is surfaced.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryConfig {
    pub fn new(backoff: Duration) -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff,
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

/// Internal decision for how to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Fail,
}

pub struct RetryingCaller {
    config: RetryConfig,
}

impl RetryingCaller {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// `attempt` is 1-based: the attempt that just failed.
    pub(crate) fn decide(&self, err: &Error, attempt: u32) -> Decision {
        if err.is_transient() && attempt < self.config.max_attempts {
            Decision::Retry {
                delay: self.config.backoff,
            }
        } else {
            Decision::Fail
        }
    }

    /// Run `f` until it succeeds, fails permanently, or attempts are exhausted.
    pub async fn call<T, F, Fut>(&self, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            let err = match f().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match self.decide(&err, attempt) {
                Decision::Retry { delay } => {
                    warn!(
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Decision::Fail => return Err(err),
            }
        }
    }
}

impl Default for RetryingCaller {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
