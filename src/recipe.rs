//! End-to-end recipe run: list images, call the API per image, format, write the table,
//! then optionally save annotated images.

use crate::annotate::ImageAnnotator;
use crate::batch::Parallelizer;
use crate::client::RekognitionApi;
use crate::config::ValidatedConfig;
use crate::folder::{generate_path_rows, Folder, PATH_COLUMN, SUPPORTED_IMAGE_FORMATS};
use crate::formatting::{format_save_images, AnnotationSummary, ResponseFormatter};
use crate::table::{
    is_empty_cell, schema_of, ApiColumnNames, ColumnDescriptions, ColumnNameRegistry, Row,
    TableSink,
};
use crate::{Error, ErrorContext, Result};
use serde_json::Value;
use std::time::Instant;
use tracing::info;

/// What a run produced.
#[derive(Debug, Clone)]
pub struct RecipeReport {
    pub rows_written: usize,
    /// Rows whose API call failed (LOG policy only).
    pub failed_rows: usize,
    pub schema: Vec<String>,
    pub column_descriptions: ColumnDescriptions,
    pub annotation: Option<AnnotationSummary>,
}

/// Where a run reads from and writes to.
pub struct RecipeIo<'a> {
    pub input: &'a dyn Folder,
    pub sink: &'a mut dyn TableSink,
    pub output_folder: Option<&'a dyn Folder>,
}

pub struct Recipe<'a> {
    config: &'a ValidatedConfig,
    api: &'a RekognitionApi,
    annotator: &'a ImageAnnotator,
}

impl<'a> Recipe<'a> {
    pub fn new(
        config: &'a ValidatedConfig,
        api: &'a RekognitionApi,
        annotator: &'a ImageAnnotator,
    ) -> Self {
        Self {
            config,
            api,
            annotator,
        }
    }

    /// Build the formatter for rows with `input_columns`, resolving the API columns first.
    pub fn formatter(&self, input_columns: &[String]) -> Result<ResponseFormatter> {
        let mut registry = ColumnNameRegistry::new(
            self.config.column_prefix.clone(),
            input_columns.iter().map(String::as_str),
        );
        let api_columns = ApiColumnNames::resolve(&mut registry)?;
        ResponseFormatter::new(
            self.config.settings.clone(),
            &mut registry,
            api_columns,
            self.config.error_policy,
        )
    }

    pub async fn run(&self, io: RecipeIo<'_>) -> Result<RecipeReport> {
        let started = Instant::now();
        let rows = generate_path_rows(io.input, SUPPORTED_IMAGE_FORMATS).await?;
        let input_columns = schema_of(&rows);

        // Configuration problems surface here, before any call.
        let formatter = self.formatter(&input_columns)?;
        let parallelizer = Parallelizer::new(self.config.workers, self.config.error_policy)?;
        info!(
            recipe = self.config.task.recipe_id(),
            images = rows.len(),
            workers = parallelizer.workers(),
            "Calling the API on {} images",
            rows.len()
        );

        let operation = self.config.task.operation();
        let options = &self.config.request;
        let api = self.api;
        let input = io.input;
        let rows = parallelizer
            .run(rows, formatter.api_columns(), |row: Row| async move {
                let path = row_path(&row)?;
                api.call_image(input, &path, operation, options).await
            })
            .await?;

        let failed_rows = rows
            .iter()
            .filter(|r| !is_empty_cell(r.get(&formatter.api_columns().error_type)))
            .count();
        let formatted = formatter.format_table(&rows)?;

        let schema = formatter.output_schema(&input_columns);
        io.sink.write_schema(&schema).await?;
        for row in &formatted {
            io.sink.write_row(row).await?;
        }
        io.sink.close().await?;

        let annotation = match io.output_folder {
            Some(output) if formatter.task().produces_images() => Some(
                format_save_images(
                    &formatter,
                    self.annotator,
                    &rows,
                    io.input,
                    output,
                    self.config.workers,
                )
                .await?,
            ),
            _ => None,
        };

        info!(
            rows = formatted.len(),
            failed_rows,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Recipe finished"
        );
        Ok(RecipeReport {
            rows_written: formatted.len(),
            failed_rows,
            schema,
            column_descriptions: formatter.column_descriptions().clone(),
            annotation,
        })
    }
}

fn row_path(row: &Row) -> Result<String> {
    row.get(PATH_COLUMN)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::runtime_with_context(
                "input row has no path",
                ErrorContext::new()
                    .with_field_path(PATH_COLUMN)
                    .with_source("recipe"),
            )
        })
}
