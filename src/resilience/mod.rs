//! # Resilience Primitives Module
//!
//! Call-admission and retry primitives shared by every worker of one API wrapper.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Strict sliding-window rate limiter (blocking or signalling) |
//! | [`retry`] | Bounded retries on transient failures with quota-period backoff |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use rekognition_batch::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
//!
//! # async fn demo() -> rekognition_batch::Result<()> {
//! // 1800 calls per 60 seconds
//! let config = RateLimiterConfig::from_quota(1800, 60).unwrap();
//! let limiter = RateLimiter::new(config);
//! limiter.acquire().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Retrying Caller
//!
//! ```rust
//! use rekognition_batch::resilience::retry::{RetryConfig, RetryingCaller};
//! use std::time::Duration;
//!
//! # async fn demo() -> rekognition_batch::Result<()> {
//! let caller = RetryingCaller::new(RetryConfig::new(Duration::from_secs(60)));
//! let value = caller.call(|| async { Ok(42) }).await?;
//! assert_eq!(value, 42);
//! # Ok(())
//! # }
//! ```

pub mod rate_limiter;
pub mod retry;
