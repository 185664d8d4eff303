use super::RekognitionApi;
use crate::resilience::rate_limiter::{RateLimitMode, RateLimiter, RateLimiterConfig};
use crate::resilience::retry::{RetryConfig, RetryingCaller, DEFAULT_MAX_ATTEMPTS};
use crate::transport::{HttpVisionClient, HttpVisionClientConfig, VisionClient};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;

/// Builder for [`RekognitionApi`].
///
/// Either inject a [`VisionClient`] or let the builder create an [`HttpVisionClient`]
/// from a region / endpoint. `REKOGNITION_ENDPOINT` overrides the endpoint.
pub struct RekognitionApiBuilder {
    client: Option<Arc<dyn VisionClient>>,
    region: Option<String>,
    endpoint: Option<String>,
    api_key: Option<String>,
    timeout: Option<Duration>,
    limits: RateLimiterConfig,
    max_attempts: u32,
}

impl Default for RekognitionApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RekognitionApiBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            region: None,
            endpoint: None,
            api_key: None,
            timeout: None,
            limits: RateLimiterConfig::default(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Use this client instead of building an HTTP one.
    pub fn client(mut self, client: Arc<dyn VisionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Override the endpoint (primarily for testing with mock servers).
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// At most `max_calls` calls per `period_secs` seconds.
    pub fn quota(mut self, max_calls: u32, period_secs: u64) -> Result<Self> {
        let mode = self.limits.mode;
        self.limits = RateLimiterConfig::from_quota(max_calls, period_secs)
            .ok_or_else(|| {
                Error::configuration(
                    "api_quota_rate_limit",
                    format!(
                        "API quota must allow at least 1 call per period of at least 1 second, got {} per {}s",
                        max_calls, period_secs
                    ),
                )
            })?
            .with_mode(mode);
        Ok(self)
    }

    pub fn limits(mut self, limits: RateLimiterConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn rate_limit_mode(mut self, mode: RateLimitMode) -> Self {
        self.limits.mode = mode;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn build(self) -> Result<RekognitionApi> {
        let client: Arc<dyn VisionClient> = match self.client {
            Some(client) => client,
            None => {
                let endpoint = std::env::var("REKOGNITION_ENDPOINT").ok().or(self.endpoint);
                let mut cfg = match (endpoint, self.region.as_deref()) {
                    (Some(endpoint), region) => {
                        let mut cfg = HttpVisionClientConfig::new(endpoint);
                        cfg.region = region.map(str::to_string);
                        cfg
                    }
                    (None, Some(region)) => HttpVisionClientConfig::for_region(region),
                    (None, None) => {
                        return Err(Error::configuration(
                            "region",
                            "Please specify a region or an endpoint",
                        ))
                    }
                };
                if let Some(key) = self.api_key {
                    cfg = cfg.with_api_key(key);
                }
                if let Some(timeout) = self.timeout {
                    cfg = cfg.with_timeout(timeout);
                }
                Arc::new(HttpVisionClient::new(cfg)?)
            }
        };

        let retry = RetryingCaller::new(
            RetryConfig::new(self.limits.period).with_max_attempts(self.max_attempts),
        );
        Ok(RekognitionApi::from_parts(
            client,
            Arc::new(RateLimiter::new(self.limits)),
            retry,
        ))
    }
}
