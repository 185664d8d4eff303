//! # Types Module
//!
//! Typed views of the remote API responses. Every field defaults when absent so a
//! partial response decodes to a (possibly empty) result rather than an error.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Confidence`] | Score normalized to `[0, 1]` at decode time |
//! | [`BoxGeometry`] | Normalized bounding box geometry |
//! | [`DetectLabelsResponse`] | Object / label detection |
//! | [`DetectTextResponse`] | Text detection |
//! | [`DetectModerationLabelsResponse`] | Unsafe content moderation |
//!
//! ```rust
//! use rekognition_batch::types::DetectLabelsResponse;
//!
//! let resp: DetectLabelsResponse =
//!     serde_json::from_str(r#"{"Labels":[{"Name":"Cat","Confidence":91.2}]}"#).unwrap();
//! assert_eq!(resp.labels[0].name, "Cat");
//! assert!((resp.labels[0].confidence.fraction() - 0.912).abs() < 1e-9);
//! ```

pub mod labels;
pub mod moderation;
pub mod text;

pub use labels::{DetectLabelsResponse, Label, LabelInstance};
pub use moderation::{
    CategoryLevel, DetectModerationLabelsResponse, ModerationCategory, ModerationLabel,
    SecondLevelCategory, TopLevelCategory,
};
pub use text::{DetectTextResponse, TextDetection};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Confidence score as a fraction in `[0, 1]`.
///
/// The provider reports percentages; they are divided by 100 (and clamped) when decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct Confidence(f64);

impl Confidence {
    pub fn from_fraction(fraction: f64) -> Self {
        Self(fraction.clamp(0.0, 1.0))
    }

    pub fn from_percent(percent: f64) -> Self {
        Self::from_fraction(percent / 100.0)
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }

    /// Back to the provider's 0–100 scale, rounded to 6 decimals.
    pub fn percent(&self) -> f64 {
        (self.0 * 100.0 * 1e6).round() / 1e6
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<f64>::deserialize(deserializer)?;
        Ok(raw.map(Confidence::from_percent).unwrap_or_default())
    }
}

impl Serialize for Confidence {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.percent())
    }
}

/// Normalized geometry, all values relative to the image dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct BoxGeometry {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Geometry {
    pub bounding_box: Option<BoxGeometry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_normalization() {
        let c: Confidence = serde_json::from_str("91.2").unwrap();
        assert!((c.fraction() - 0.912).abs() < 1e-12);
        assert_eq!(c.percent(), 91.2);

        let over: Confidence = serde_json::from_str("250").unwrap();
        assert_eq!(over.fraction(), 1.0);

        let null: Confidence = serde_json::from_str("null").unwrap();
        assert_eq!(null.fraction(), 0.0);
    }

    #[test]
    fn test_geometry_defaults() {
        let g: BoxGeometry = serde_json::from_str(r#"{"Width":0.5}"#).unwrap();
        assert_eq!(g.width, 0.5);
        assert_eq!(g.top, 0.0);
    }
}
