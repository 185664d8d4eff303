use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub max_calls: u32,
    pub period: Duration,
    /// Calls recorded within the trailing window.
    pub calls_in_window: usize,
    /// Estimated wait time until a slot frees up (ms), if the window is currently full.
    pub estimated_wait_ms: Option<u64>,
}

/// What `acquire` does when the window is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimitMode {
    /// Sleep until a slot frees up.
    #[default]
    Block,
    /// Return [`Error::RateLimitExceeded`] immediately; the retry layer backs off.
    Signal,
}

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum calls within one period.
    pub max_calls: u32,
    /// Length of the trailing window.
    pub period: Duration,
    pub mode: RateLimitMode,
}

impl RateLimiterConfig {
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self {
            max_calls,
            period,
            mode: RateLimitMode::Block,
        }
    }

    /// Quota as configured by users: calls per period in whole seconds.
    pub fn from_quota(max_calls: u32, period_secs: u64) -> Option<Self> {
        if max_calls == 0 || period_secs == 0 {
            return None;
        }
        Some(Self::new(max_calls, Duration::from_secs(period_secs)))
    }

    pub fn with_mode(mut self, mode: RateLimitMode) -> Self {
        self.mode = mode;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self::new(1800, Duration::from_secs(60))
    }
}

/// Sliding-window rate limiter.
///
/// - Strict: a call is only recorded if the trailing window holds fewer than `max_calls`
/// - Shared by every worker of one API wrapper; state lives behind an async mutex
pub struct RateLimiter {
    cfg: RateLimiterConfig,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(cfg: RateLimiterConfig) -> Self {
        let capacity = cfg.max_calls.min(4096) as usize;
        Self {
            cfg,
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.cfg
    }

    fn evict_expired(period: Duration, window: &mut VecDeque<Instant>, now: Instant) {
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= period {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Record a call if the window has room, else report how long until the oldest call expires.
    async fn try_record(&self) -> std::result::Result<(), Duration> {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        Self::evict_expired(self.cfg.period, &mut window, now);

        if window.len() < self.cfg.max_calls as usize {
            window.push_back(now);
            return Ok(());
        }

        let wait = window
            .front()
            .map(|oldest| (*oldest + self.cfg.period).saturating_duration_since(now))
            .unwrap_or(self.cfg.period);
        Err(wait)
    }

    /// Acquire one call slot.
    ///
    /// In [`RateLimitMode::Block`] this sleeps until the window has room. In
    /// [`RateLimitMode::Signal`] it returns [`Error::RateLimitExceeded`] instead.
    pub async fn acquire(&self) -> Result<()> {
        if self.cfg.max_calls == 0 {
            return Ok(());
        }

        loop {
            let wait = match self.try_record().await {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            if self.cfg.mode == RateLimitMode::Signal {
                return Err(Error::RateLimitExceeded { retry_after: wait });
            }

            debug!(wait_ms = wait.as_millis() as u64, "rate limit window full, waiting");
            // The oldest call may expire at exactly `wait`; sleep at least 1ms to make progress.
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Try to acquire a slot without waiting, returns true if successful
    pub async fn try_acquire(&self) -> bool {
        if self.cfg.max_calls == 0 {
            return true;
        }
        self.try_record().await.is_ok()
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut window = self.window.lock().await;
        let now = Instant::now();
        Self::evict_expired(self.cfg.period, &mut window, now);

        let estimated_wait_ms = if self.cfg.max_calls > 0 && window.len() >= self.cfg.max_calls as usize
        {
            window.front().map(|oldest| {
                (*oldest + self.cfg.period)
                    .saturating_duration_since(now)
                    .as_millis() as u64
            })
        } else {
            None
        };

        RateLimiterSnapshot {
            max_calls: self.cfg.max_calls,
            period: self.cfg.period,
            calls_in_window: window.len(),
            estimated_wait_ms,
        }
    }
}
