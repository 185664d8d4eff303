use super::{list_cell, response_orientation, score_cell, FormatterBase};
use crate::annotate::{BoundingBox, Orientation};
use crate::table::{empty_cell, ColumnNameRegistry, Row};
use crate::types::DetectLabelsResponse;
use crate::{Error, Result};
use serde_json::Value;

/// Label detection: label list plus `num_objects` (name, score) column pairs.
///
/// Score columns hold the provider's 0–100 percentage.
#[derive(Debug, Clone)]
pub struct ObjectDetectionFormatter {
    pub(crate) base: FormatterBase,
    num_objects: usize,
    orientation_correction: bool,
    label_list_column: String,
    label_columns: Vec<(String, String)>,
    orientation_column: Option<String>,
}

impl ObjectDetectionFormatter {
    pub(crate) fn new(
        mut base: FormatterBase,
        registry: &mut ColumnNameRegistry,
        num_objects: usize,
        orientation_correction: bool,
    ) -> Result<Self> {
        if num_objects < 1 {
            return Err(Error::configuration(
                "num_objects",
                "Number of labels must be at least 1",
            ));
        }
        let label_list_column =
            base.add_column(registry, "label_list", "List of object labels from the API")?;
        let mut label_columns = Vec::with_capacity(num_objects);
        for n in 1..=num_objects {
            let name = base.add_column(
                registry,
                &format!("label_{}_name", n),
                format!("Object label {} extracted by the API", n),
            )?;
            let score = base.add_column(
                registry,
                &format!("label_{}_score", n),
                format!("Confidence score in label {} from 0 to 100", n),
            )?;
            label_columns.push((name, score));
        }
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
            num_objects,
            orientation_correction,
            label_list_column,
            label_columns,
            orientation_column,
        })
    }

    pub fn num_objects(&self) -> usize {
        self.num_objects
    }

    pub fn label_list_column(&self) -> &str {
        &self.label_list_column
    }

    /// `(name column, score column)` per rank.
    pub fn label_columns(&self) -> &[(String, String)] {
        &self.label_columns
    }

    pub fn format_row(&self, row: &Row) -> Result<Row> {
        let response: DetectLabelsResponse = self.base.parse_response(row)?;
        let labels = response.sorted_labels();

        let mut added = Row::new();
        added.insert(
            self.label_list_column.clone(),
            list_cell(labels.iter().map(|l| l.name.clone()).collect()),
        );
        for (rank, (name_col, score_col)) in self.label_columns.iter().enumerate() {
            let (name, score) = match labels.get(rank) {
                Some(label) => (
                    Value::String(label.name.clone()),
                    score_cell(label.confidence.percent()),
                ),
                None => (empty_cell(), empty_cell()),
            };
            added.insert(name_col.clone(), name);
            added.insert(score_col.clone(), score);
        }
        if let Some(col) = &self.orientation_column {
            added.insert(
                col.clone(),
                Value::String(response.orientation_correction.unwrap_or_default()),
            );
        }
        Ok(self.base.assemble(row, added))
    }

    /// One captioned box per located label instance, lowest confidence first.
    pub fn annotation(&self, raw_response: &str) -> Result<(Orientation, Vec<BoundingBox>)> {
        let response: DetectLabelsResponse = self.base.parse_raw(raw_response)?;
        let mut boxes: Vec<BoundingBox> = response
            .labels
            .iter()
            .flat_map(|label| {
                label.instances.iter().filter_map(move |instance| {
                    let geometry = instance.bounding_box.as_ref()?;
                    let confidence = instance.confidence.fraction();
                    Some(BoundingBox::from_geometry(
                        geometry,
                        Some(format!("{} - {:.1}%", label.name, confidence * 100.0)),
                        confidence,
                    ))
                })
            })
            .collect();
        boxes.sort_by(|a, b| a.confidence.total_cmp(&b.confidence));
        let orientation = response_orientation(
            self.orientation_correction,
            response.orientation_correction.as_deref(),
        );
        Ok((orientation, boxes))
    }
}
