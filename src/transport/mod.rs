//! Remote API boundary.
//!
//! A [`VisionClient`] performs one named operation with a JSON request body and returns
//! the JSON response. [`HttpVisionClient`] speaks the JSON 1.1 protocol over HTTP; tests
//! and alternative transports implement the trait directly.
//!
//! [`HttpVisionClient`] authenticates with a bearer API key (`Authorization: Bearer ...`).
//! It does not sign requests with AWS Signature Version 4, so it targets a compatible
//! gateway or proxy rather than the AWS endpoint itself. For direct AWS access, implement
//! [`VisionClient`] on top of a signing client.

mod http;

pub use http::{HttpVisionClient, HttpVisionClientConfig};

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

/// Remote operations used by the connectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DetectLabels,
    DetectText,
    DetectModerationLabels,
    /// Only used to obtain the image's `OrientationCorrection`.
    RecognizeCelebrities,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::DetectLabels => "DetectLabels",
            Self::DetectText => "DetectText",
            Self::DetectModerationLabels => "DetectModerationLabels",
            Self::RecognizeCelebrities => "RecognizeCelebrities",
        }
    }

    /// Value of the `X-Amz-Target` header.
    pub fn target(&self) -> String {
        format!("RekognitionService.{}", self.name())
    }

    /// Whether the request accepts `MaxLabels` / `MinConfidence`.
    pub fn accepts_max_labels(&self) -> bool {
        matches!(self, Self::DetectLabels)
    }

    pub fn accepts_min_confidence(&self) -> bool {
        matches!(self, Self::DetectLabels | Self::DetectModerationLabels)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[async_trait]
pub trait VisionClient: Send + Sync {
    async fn invoke(&self, operation: Operation, body: Value) -> Result<Value>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Other(String),
}
