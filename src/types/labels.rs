//! `DetectLabels` response.

use super::{BoxGeometry, Confidence};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DetectLabelsResponse {
    pub labels: Vec<Label>,
    pub orientation_correction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Label {
    pub name: String,
    pub confidence: Confidence,
    pub instances: Vec<LabelInstance>,
}

/// One located occurrence of a label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LabelInstance {
    pub bounding_box: Option<BoxGeometry>,
    pub confidence: Confidence,
}

impl DetectLabelsResponse {
    /// Labels by descending confidence. Ties keep response order.
    pub fn sorted_labels(&self) -> Vec<&Label> {
        let mut labels: Vec<&Label> = self.labels.iter().collect();
        labels.sort_by(|a, b| {
            b.confidence
                .fraction()
                .total_cmp(&a.confidence.fraction())
        });
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_labels_descending() {
        let resp: DetectLabelsResponse = serde_json::from_str(
            r#"{"Labels":[{"Name":"Dog","Confidence":55.0},{"Name":"Cat","Confidence":91.2}],
                "OrientationCorrection":"ROTATE_0"}"#,
        )
        .unwrap();
        let names: Vec<&str> = resp.sorted_labels().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Cat", "Dog"]);
        assert_eq!(resp.orientation_correction.as_deref(), Some("ROTATE_0"));
    }

    #[test]
    fn test_instances_decode() {
        let resp: DetectLabelsResponse = serde_json::from_str(
            r#"{"Labels":[{"Name":"Car","Confidence":99,
                "Instances":[{"BoundingBox":{"Width":0.1,"Height":0.2,"Left":0.3,"Top":0.4},"Confidence":98}]}]}"#,
        )
        .unwrap();
        let inst = &resp.labels[0].instances[0];
        assert_eq!(inst.bounding_box.map(|b| b.left), Some(0.3));
        assert!((inst.confidence.fraction() - 0.98).abs() < 1e-12);
    }
}
