//! # Client Module
//!
//! [`RekognitionApi`] owns the remote client together with its rate limiter and retry
//! policy, and turns one input image path into one remote call.
//!
//! Every remote call made through the wrapper, orientation lookups included, first waits
//! on the shared [`RateLimiter`] and is retried by the [`RetryingCaller`].

mod builder;

pub use builder::RekognitionApiBuilder;

use crate::annotate::{decode_image, encode_image, Orientation};
use crate::folder::Folder;
use crate::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::resilience::retry::{RetryConfig, RetryingCaller};
use crate::transport::{Operation, VisionClient};
use crate::Result;
use base64::Engine as _;
use bytes::Bytes;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::info;

/// Task parameters added to each image request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageRequestOptions {
    /// Look up the orientation first and send the upright image.
    pub orientation_correction: bool,
    /// `MaxLabels`, for label detection.
    pub num_objects: Option<u32>,
    /// Threshold as a fraction; sent as the 0–100 integer `MinConfidence`.
    pub minimum_score: Option<f64>,
}

pub struct RekognitionApi {
    client: Arc<dyn VisionClient>,
    limiter: Arc<RateLimiter>,
    retry: RetryingCaller,
}

impl RekognitionApi {
    /// Wrapper whose retry backoff equals the quota period.
    pub fn new(client: Arc<dyn VisionClient>, limits: RateLimiterConfig) -> Self {
        let retry = RetryingCaller::new(RetryConfig::new(limits.period));
        Self {
            client,
            limiter: Arc::new(RateLimiter::new(limits)),
            retry,
        }
    }

    pub fn builder() -> RekognitionApiBuilder {
        RekognitionApiBuilder::new()
    }

    pub(crate) fn from_parts(
        client: Arc<dyn VisionClient>,
        limiter: Arc<RateLimiter>,
        retry: RetryingCaller,
    ) -> Self {
        Self {
            client,
            limiter,
            retry,
        }
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn retry_policy(&self) -> &RetryingCaller {
        &self.retry
    }

    /// One rate-limited, retried remote call.
    pub async fn call(&self, operation: Operation, body: Value) -> Result<Value> {
        self.retry
            .call(|| {
                let body = body.clone();
                async move {
                    self.limiter.acquire().await?;
                    self.client.invoke(operation, body).await
                }
            })
            .await
    }

    /// Run `operation` on the image stored at `path` and return the response as JSON text.
    ///
    /// Folders exposing an [`crate::folder::S3Location`] are passed by reference; other
    /// folders send the bytes inline. With orientation correction the detected
    /// `OrientationCorrection` is copied into the returned response.
    pub async fn call_image(
        &self,
        folder: &dyn Folder,
        path: &str,
        operation: Operation,
        options: &ImageRequestOptions,
    ) -> Result<String> {
        let mut downloaded: Option<Bytes> = None;
        let mut image = match folder.s3_location() {
            Some(location) => json!({
                "S3Object": {"Bucket": location.bucket, "Name": location.key_for(path)}
            }),
            None => {
                let data = folder.download(path).await?;
                let payload = inline_image(&data);
                downloaded = Some(data);
                payload
            }
        };

        let mut detected_orientation = None;
        if options.orientation_correction {
            let lookup = self
                .call(
                    Operation::RecognizeCelebrities,
                    json!({ "Image": image.clone() }),
                )
                .await?;
            let detected = lookup
                .get("OrientationCorrection")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            if let Some(orientation) = Orientation::parse(&detected).filter(|o| !o.is_identity()) {
                let data = match downloaded.take() {
                    Some(data) => data,
                    None => folder.download(path).await?,
                };
                let upright = orientation.apply(decode_image(&data, path)?);
                image = inline_image(&encode_image(upright, path)?);
                info!(path, orientation = orientation.as_str(), "Corrected image orientation");
            }
            detected_orientation = Some(detected);
        }

        let mut request = Map::new();
        request.insert("Image".into(), image);
        if let Some(n) = options.num_objects.filter(|_| operation.accepts_max_labels()) {
            request.insert("MaxLabels".into(), json!(n));
        }
        if let Some(score) = options
            .minimum_score
            .filter(|s| *s > 0.0 && operation.accepts_min_confidence())
        {
            request.insert("MinConfidence".into(), json!(min_confidence_percent(score)));
        }

        let mut response = self.call(operation, Value::Object(request)).await?;
        if let (Some(orientation), Value::Object(map)) = (detected_orientation, &mut response) {
            map.insert("OrientationCorrection".into(), Value::String(orientation));
        }
        Ok(serde_json::to_string(&response)?)
    }
}

fn inline_image(data: &[u8]) -> Value {
    json!({ "Bytes": base64::engine::general_purpose::STANDARD.encode(data) })
}

/// Fraction to the integer percentage the remote API expects.
pub fn min_confidence_percent(fraction: f64) -> u32 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u32
}
