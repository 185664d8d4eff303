use super::{list_cell, response_orientation, FormatterBase};
use crate::annotate::{BoundingBox, Orientation};
use crate::table::{empty_cell, ColumnNameRegistry, Row};
use crate::types::DetectTextResponse;
use crate::{Error, Result};
use serde_json::Value;

/// Text detection: top-level fragments at or above `minimum_score`, as a list and as one
/// space-joined string.
#[derive(Debug, Clone)]
pub struct TextDetectionFormatter {
    pub(crate) base: FormatterBase,
    minimum_score: f64,
    orientation_correction: bool,
    list_column: String,
    concat_column: String,
    orientation_column: Option<String>,
}

impl TextDetectionFormatter {
    pub(crate) fn new(
        mut base: FormatterBase,
        registry: &mut ColumnNameRegistry,
        minimum_score: f64,
        orientation_correction: bool,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&minimum_score) {
            return Err(Error::configuration(
                "minimum_score",
                format!("Minimum confidence score must be between 0 and 1, got {}", minimum_score),
            ));
        }
        let list_column = base.add_column(
            registry,
            "detections_list",
            "List of text detections from the API",
        )?;
        let concat_column = base.add_column(
            registry,
            "detections_concat",
            "Concatenated text detections from the API",
        )?;
        let orientation_column = if orientation_correction {
            Some(base.add_column(
                registry,
                "orientation_correction",
                "Orientation correction detected by the API",
            )?)
        } else {
            None
        };
        Ok(Self {
            base,
            minimum_score,
            orientation_correction,
            list_column,
            concat_column,
            orientation_column,
        })
    }

    pub fn minimum_score(&self) -> f64 {
        self.minimum_score
    }

    pub fn list_column(&self) -> &str {
        &self.list_column
    }

    pub fn concat_column(&self) -> &str {
        &self.concat_column
    }

    pub fn format_row(&self, row: &Row) -> Result<Row> {
        let response: DetectTextResponse = self.base.parse_response(row)?;
        let texts: Vec<String> = response
            .kept_fragments(self.minimum_score)
            .map(|t| t.detected_text.clone())
            .collect();

        let mut added = Row::new();
        let concat = if texts.is_empty() {
            empty_cell()
        } else {
            Value::String(texts.join(" "))
        };
        added.insert(self.list_column.clone(), list_cell(texts));
        added.insert(self.concat_column.clone(), concat);
        if let Some(col) = &self.orientation_column {
            added.insert(
                col.clone(),
                Value::String(response.orientation_correction.unwrap_or_default()),
            );
        }
        Ok(self.base.assemble(row, added))
    }

    /// One uncaptioned box per kept fragment.
    pub fn annotation(&self, raw_response: &str) -> Result<(Orientation, Vec<BoundingBox>)> {
        let response: DetectTextResponse = self.base.parse_raw(raw_response)?;
        let boxes = response
            .kept_fragments(self.minimum_score)
            .filter_map(|t| {
                let geometry = t.geometry.as_ref()?.bounding_box.as_ref()?;
                Some(BoundingBox::from_geometry(
                    geometry,
                    None,
                    t.confidence.fraction(),
                ))
            })
            .collect();
        let orientation = response_orientation(
            self.orientation_correction,
            response.orientation_correction.as_deref(),
        );
        Ok((orientation, boxes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::ErrorPolicy;
    use crate::table::ApiColumnNames;

    fn formatter(minimum_score: f64) -> Result<TextDetectionFormatter> {
        let mut registry = ColumnNameRegistry::new("text_api", ["path"]);
        let api = ApiColumnNames::resolve(&mut registry)?;
        TextDetectionFormatter::new(
            FormatterBase::new(api, ErrorPolicy::LogAndContinue),
            &mut registry,
            minimum_score,
            false,
        )
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(formatter(-0.1).is_err());
        assert!(formatter(1.5).is_err());
        assert!(formatter(1.0).is_ok());
    }

    #[test]
    fn test_annotation_boxes_have_no_caption() {
        let f = formatter(0.5).unwrap();
        let raw = r#"{"TextDetections":[
            {"DetectedText":"Hi","Confidence":99,"Geometry":{"BoundingBox":{"Width":0.2,"Height":0.1,"Left":0.1,"Top":0.1}}},
            {"DetectedText":"H","Confidence":99,"ParentId":0,"Geometry":{"BoundingBox":{"Width":0.1,"Height":0.1,"Left":0.1,"Top":0.1}}},
            {"DetectedText":"No box","Confidence":99}
        ],"OrientationCorrection":"ROTATE_90"}"#;
        let (orientation, boxes) = f.annotation(raw).unwrap();
        // correction disabled
        assert_eq!(orientation, Orientation::Rotate0);
        assert_eq!(boxes.len(), 1);
        assert!(boxes[0].label.is_none());
        assert_eq!(boxes[0].width, 0.2);
    }
}
