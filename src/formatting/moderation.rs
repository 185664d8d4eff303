use super::{list_cell, score_cell, FormatterBase};
use crate::table::{empty_cell, ColumnNameRegistry, Row};
use crate::types::{CategoryLevel, DetectModerationLabelsResponse, ModerationCategory};
use crate::{Error, Result};
use serde_json::Value;

/// Unsafe content moderation: per-category best score, an "is unsafe" flag and the list
/// of matched categories.
#[derive(Debug, Clone)]
pub struct ModerationFormatter {
    pub(crate) base: FormatterBase,
    level: CategoryLevel,
    is_unsafe_column: String,
    categories_column: String,
    category_columns: Vec<(ModerationCategory, String)>,
}

impl ModerationFormatter {
    pub(crate) fn new(
        mut base: FormatterBase,
        registry: &mut ColumnNameRegistry,
        level: CategoryLevel,
        categories: Vec<ModerationCategory>,
    ) -> Result<Self> {
        if categories.is_empty() {
            return Err(Error::configuration(
                "categories",
                "Choose at least one unsafe content category",
            ));
        }
        if let Some(wrong) = categories.iter().find(|c| c.level() != level) {
            return Err(Error::configuration(
                "categories",
                format!(
                    "Category '{}' does not belong to the selected category level",
                    wrong.display_name()
                ),
            ));
        }

        let is_unsafe_column =
            base.add_column(registry, "unsafe_content", "Unsafe content detected by the API")?;
        let categories_column = base.add_column(
            registry,
            "unsafe_categories",
            "List of unsafe content categories detected by the API",
        )?;
        let mut category_columns: Vec<(ModerationCategory, String)> = Vec::new();
        for category in categories {
            if category_columns.iter().any(|(c, _)| *c == category) {
                continue;
            }
            let column = base.add_column(
                registry,
                &format!("{}_score", category.key()),
                format!(
                    "Confidence score in category '{}' from 0 to 100",
                    category.display_name()
                ),
            )?;
            category_columns.push((category, column));
        }

        Ok(Self {
            base,
            level,
            is_unsafe_column,
            categories_column,
            category_columns,
        })
    }

    pub fn level(&self) -> CategoryLevel {
        self.level
    }

    pub fn is_unsafe_column(&self) -> &str {
        &self.is_unsafe_column
    }

    pub fn categories_column(&self) -> &str {
        &self.categories_column
    }

    pub fn category_columns(&self) -> &[(ModerationCategory, String)] {
        &self.category_columns
    }

    pub fn format_row(&self, row: &Row) -> Result<Row> {
        let response: DetectModerationLabelsResponse = self.base.parse_response(row)?;

        let mut matched = Vec::new();
        let mut scores = Row::new();
        for (category, column) in &self.category_columns {
            let cell = match response.best_match(category) {
                Some(label) => {
                    matched.push(category.display_name().to_string());
                    score_cell(label.confidence.percent())
                }
                None => empty_cell(),
            };
            scores.insert(column.clone(), cell);
        }

        let mut added = Row::new();
        added.insert(self.is_unsafe_column.clone(), Value::Bool(!matched.is_empty()));
        added.insert(self.categories_column.clone(), list_cell(matched));
        added.extend(scores);
        Ok(self.base.assemble(row, added))
    }
}
