//! `DetectText` response.

use super::{Confidence, Geometry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetectTextResponse {
    pub text_detections: Vec<TextDetection>,
    pub orientation_correction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TextDetection {
    pub detected_text: String,
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub id: Option<Value>,
    /// Set on words that belong to a line; numeric or string ids are both accepted.
    pub parent_id: Option<Value>,
    pub confidence: Confidence,
    pub geometry: Option<Geometry>,
}

impl TextDetection {
    pub fn is_top_level(&self) -> bool {
        matches!(self.parent_id, None | Some(Value::Null))
    }
}

impl DetectTextResponse {
    /// Top-level fragments whose confidence fraction is at least `minimum_score`.
    pub fn kept_fragments(&self, minimum_score: f64) -> impl Iterator<Item = &TextDetection> {
        self.text_detections
            .iter()
            .filter(move |t| t.is_top_level() && t.confidence.fraction() >= minimum_score)
    }
}
