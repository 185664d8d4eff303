//! # Formatting Module
//!
//! Turns the raw JSON responses collected by the [`crate::batch::Parallelizer`] into
//! typed output columns and, for the detection tasks, annotated images.
//!
//! ## Column layout
//!
//! A formatted row holds the input columns in their original order, then the columns
//! added by the formatter, then the raw API columns (response, error message, error type).
//! Every added column name comes from a [`ColumnNameRegistry`] built over the input schema,
//! so re-running on already-augmented data never overwrites earlier results.
//!
//! ## Malformed responses
//!
//! A response cell that is not valid JSON is an empty result. Under
//! [`ErrorPolicy::LogAndContinue`] a warning is logged; under [`ErrorPolicy::FailFast`]
//! formatting fails with [`Error::MalformedResponse`]. An empty response cell (the call
//! failed) is an empty result without a warning.
//!
//! ## Example
//!
//! ```rust
//! use rekognition_batch::batch::ErrorPolicy;
//! use rekognition_batch::formatting::{ResponseFormatter, TaskSettings};
//! use rekognition_batch::table::{ApiColumnNames, ColumnNameRegistry, Row};
//! use serde_json::json;
//!
//! let mut registry = ColumnNameRegistry::new("object_api", ["path"]);
//! let api = ApiColumnNames::resolve(&mut registry).unwrap();
//! let formatter = ResponseFormatter::new(
//!     TaskSettings::ObjectDetection { num_objects: 1, orientation_correction: false },
//!     &mut registry,
//!     api.clone(),
//!     ErrorPolicy::LogAndContinue,
//! )
//! .unwrap();
//!
//! let mut row = Row::new();
//! row.insert("path".into(), json!("/cat.jpg"));
//! row.insert(api.response.clone(), json!(r#"{"Labels":[{"Name":"Cat","Confidence":91.2}]}"#));
//! row.insert(api.error_message.clone(), json!(""));
//! row.insert(api.error_type.clone(), json!(""));
//!
//! let out = formatter.format_row(&row).unwrap();
//! assert_eq!(out["object_api_label_1_name"], json!("Cat"));
//! ```

mod images;
mod moderation;
mod object_detection;
mod text_detection;

pub use images::{format_save_images, AnnotationSummary};
pub use moderation::ModerationFormatter;
pub use object_detection::ObjectDetectionFormatter;
pub use text_detection::TextDetectionFormatter;

use crate::annotate::{BoundingBox, ImageAnnotator, Orientation};
use crate::batch::ErrorPolicy;
use crate::table::{is_empty_cell, ApiColumnNames, ColumnDescriptions, ColumnNameRegistry, Row};
use crate::transport::Operation;
use crate::types::{CategoryLevel, ModerationCategory};
use crate::{Error, Result};
use image::RgbImage;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Which remote task a formatter handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "object_api")]
    ObjectDetection,
    #[serde(rename = "text_api")]
    TextDetection,
    #[serde(rename = "moderation_api")]
    ContentModeration,
}

impl TaskKind {
    /// Recipe identifier, also the default column prefix.
    pub fn recipe_id(&self) -> &'static str {
        match self {
            Self::ObjectDetection => "object_api",
            Self::TextDetection => "text_api",
            Self::ContentModeration => "moderation_api",
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::ObjectDetection => Operation::DetectLabels,
            Self::TextDetection => Operation::DetectText,
            Self::ContentModeration => Operation::DetectModerationLabels,
        }
    }

    /// Whether the task has geometry to draw.
    pub fn produces_images(&self) -> bool {
        !matches!(self, Self::ContentModeration)
    }
}

/// Task-specific formatter settings.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskSettings {
    ObjectDetection {
        num_objects: usize,
        orientation_correction: bool,
    },
    TextDetection {
        /// Fraction in `[0, 1]`.
        minimum_score: f64,
        orientation_correction: bool,
    },
    ContentModeration {
        level: CategoryLevel,
        categories: Vec<ModerationCategory>,
    },
}

impl TaskSettings {
    pub fn task(&self) -> TaskKind {
        match self {
            Self::ObjectDetection { .. } => TaskKind::ObjectDetection,
            Self::TextDetection { .. } => TaskKind::TextDetection,
            Self::ContentModeration { .. } => TaskKind::ContentModeration,
        }
    }
}

/// State shared by every formatter variant.
#[derive(Debug, Clone)]
pub(crate) struct FormatterBase {
    pub(crate) api_columns: ApiColumnNames,
    pub(crate) error_policy: ErrorPolicy,
    pub(crate) added_columns: Vec<String>,
    pub(crate) descriptions: ColumnDescriptions,
}

impl FormatterBase {
    pub(crate) fn new(api_columns: ApiColumnNames, error_policy: ErrorPolicy) -> Self {
        Self {
            api_columns,
            error_policy,
            added_columns: Vec::new(),
            descriptions: ColumnDescriptions::new(),
        }
    }

    /// Resolve `role`, record its description and remember it as an added column.
    pub(crate) fn add_column(
        &mut self,
        registry: &mut ColumnNameRegistry,
        role: &str,
        description: impl Into<String>,
    ) -> Result<String> {
        let name = registry.resolve(role)?;
        self.descriptions.add(name.clone(), description);
        self.added_columns.push(name.clone());
        Ok(name)
    }

    /// Decode the row's response cell; see the module docs for the malformed case.
    pub(crate) fn parse_response<T: DeserializeOwned + Default>(&self, row: &Row) -> Result<T> {
        let cell = row.get(&self.api_columns.response);
        if is_empty_cell(cell) {
            return Ok(T::default());
        }
        let parsed = match cell {
            Some(Value::String(raw)) => serde_json::from_str::<T>(raw),
            Some(other) => serde_json::from_value::<T>(other.clone()),
            None => return Ok(T::default()),
        };
        parsed.or_else(|e| self.malformed(e.to_string()))
    }

    pub(crate) fn parse_raw<T: DeserializeOwned + Default>(&self, raw: &str) -> Result<T> {
        if raw.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str::<T>(raw).or_else(|e| self.malformed(e.to_string()))
    }

    fn malformed<T: Default>(&self, reason: String) -> Result<T> {
        match self.error_policy {
            ErrorPolicy::FailFast => Err(Error::malformed_response(
                format!("API response is not valid JSON: {}", reason),
                &self.api_columns.response,
            )),
            ErrorPolicy::LogAndContinue => {
                warn!(
                    column = %self.api_columns.response,
                    error = %reason,
                    "API response is not valid JSON, treating it as empty"
                );
                Ok(T::default())
            }
        }
    }

    /// Input columns in order, then `added` (in `added_columns` order), then API columns.
    pub(crate) fn assemble(&self, row: &Row, mut added: Row) -> Row {
        let mut out = Row::new();
        for (name, value) in row {
            if !self.api_columns.contains(name) && !self.added_columns.contains(name) {
                out.insert(name.clone(), value.clone());
            }
        }
        for name in &self.added_columns {
            if let Some(value) = added.remove(name) {
                out.insert(name.clone(), value);
            }
        }
        for name in self.api_columns.as_vec() {
            out.insert(
                name.clone(),
                row.get(&name).cloned().unwrap_or_else(crate::table::empty_cell),
            );
        }
        out
    }

    /// Full output schema for input rows with `input_columns`.
    pub(crate) fn output_schema(&self, input_columns: &[String]) -> Vec<String> {
        input_columns
            .iter()
            .filter(|c| !self.api_columns.contains(c) && !self.added_columns.contains(c))
            .cloned()
            .chain(self.added_columns.iter().cloned())
            .chain(self.api_columns.as_vec())
            .collect()
    }
}

/// Closed family of response formatters, dispatched on [`TaskKind`].
#[derive(Debug, Clone)]
pub enum ResponseFormatter {
    ObjectDetection(ObjectDetectionFormatter),
    TextDetection(TextDetectionFormatter),
    ContentModeration(ModerationFormatter),
}

impl ResponseFormatter {
    /// Build the formatter for `settings`, resolving its columns through `registry`.
    ///
    /// `registry` should be the one `api_columns` were resolved with.
    pub fn new(
        settings: TaskSettings,
        registry: &mut ColumnNameRegistry,
        api_columns: ApiColumnNames,
        error_policy: ErrorPolicy,
    ) -> Result<Self> {
        let base = FormatterBase::new(api_columns, error_policy);
        Ok(match settings {
            TaskSettings::ObjectDetection {
                num_objects,
                orientation_correction,
            } => Self::ObjectDetection(ObjectDetectionFormatter::new(
                base,
                registry,
                num_objects,
                orientation_correction,
            )?),
            TaskSettings::TextDetection {
                minimum_score,
                orientation_correction,
            } => Self::TextDetection(TextDetectionFormatter::new(
                base,
                registry,
                minimum_score,
                orientation_correction,
            )?),
            TaskSettings::ContentModeration { level, categories } => Self::ContentModeration(
                ModerationFormatter::new(base, registry, level, categories)?,
            ),
        })
    }

    pub fn task(&self) -> TaskKind {
        match self {
            Self::ObjectDetection(_) => TaskKind::ObjectDetection,
            Self::TextDetection(_) => TaskKind::TextDetection,
            Self::ContentModeration(_) => TaskKind::ContentModeration,
        }
    }

    fn base(&self) -> &FormatterBase {
        match self {
            Self::ObjectDetection(f) => &f.base,
            Self::TextDetection(f) => &f.base,
            Self::ContentModeration(f) => &f.base,
        }
    }

    pub fn api_columns(&self) -> &ApiColumnNames {
        &self.base().api_columns
    }

    /// Columns this formatter appends, in output order, API columns excluded.
    pub fn added_columns(&self) -> &[String] {
        &self.base().added_columns
    }

    pub fn column_descriptions(&self) -> &ColumnDescriptions {
        &self.base().descriptions
    }

    pub fn output_schema(&self, input_columns: &[String]) -> Vec<String> {
        self.base().output_schema(input_columns)
    }

    /// Append the typed columns for one row.
    pub fn format_row(&self, row: &Row) -> Result<Row> {
        match self {
            Self::ObjectDetection(f) => f.format_row(row),
            Self::TextDetection(f) => f.format_row(row),
            Self::ContentModeration(f) => f.format_row(row),
        }
    }

    pub fn format_table(&self, rows: &[Row]) -> Result<Vec<Row>> {
        rows.iter().map(|row| self.format_row(row)).collect()
    }

    /// Orientation to apply and boxes to draw for a raw response; `None` for tasks
    /// without geometry.
    pub fn annotation(&self, raw_response: &str) -> Result<Option<(Orientation, Vec<BoundingBox>)>> {
        match self {
            Self::ObjectDetection(f) => f.annotation(raw_response).map(Some),
            Self::TextDetection(f) => f.annotation(raw_response).map(Some),
            Self::ContentModeration(_) => Ok(None),
        }
    }

    /// Draw the response's detections onto `image`.
    pub fn format_image(
        &self,
        annotator: &ImageAnnotator,
        image: RgbImage,
        raw_response: &str,
    ) -> Result<RgbImage> {
        match self.annotation(raw_response)? {
            Some((orientation, boxes)) => Ok(annotator.annotate(image, orientation, &boxes)),
            None => Err(Error::configuration(
                "output_folder",
                format!(
                    "{} responses carry no geometry to draw",
                    self.task().recipe_id()
                ),
            )),
        }
    }
}

/// Orientation reported in a response, when correction is enabled.
pub(crate) fn response_orientation(enabled: bool, reported: Option<&str>) -> Orientation {
    if !enabled {
        return Orientation::Rotate0;
    }
    reported.and_then(Orientation::parse).unwrap_or_default()
}

/// List cell: "" when empty.
pub(crate) fn list_cell(items: Vec<String>) -> Value {
    if items.is_empty() {
        crate::table::empty_cell()
    } else {
        Value::Array(items.into_iter().map(Value::String).collect())
    }
}

pub(crate) fn score_cell(percent: f64) -> Value {
    serde_json::Number::from_f64(percent)
        .map(Value::Number)
        .unwrap_or_else(crate::table::empty_cell)
}
