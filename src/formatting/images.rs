//! Annotated image output.

use super::ResponseFormatter;
use crate::annotate::{decode_image, encode_image, ImageAnnotator};
use crate::batch::ErrorPolicy;
use crate::folder::{Folder, PATH_COLUMN};
use crate::table::Row;
use crate::{Error, Result};
use futures::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Outcome of one annotation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// Rows without a response (failed call) or without a path.
    pub skipped: usize,
}

/// Draw every row's detections on its source image and upload the result to `output`
/// under the same path.
///
/// Per-image failures are counted and logged. With [`ErrorPolicy::FailFast`] the first one
/// is returned instead: images not yet started are left alone, while those already in
/// flight finish and are uploaded.
pub async fn format_save_images(
    formatter: &ResponseFormatter,
    annotator: &ImageAnnotator,
    rows: &[Row],
    input: &dyn Folder,
    output: &dyn Folder,
    workers: usize,
) -> Result<AnnotationSummary> {
    if !formatter.task().produces_images() {
        return Err(Error::configuration(
            "output_folder",
            format!(
                "{} does not produce annotated images",
                formatter.task().recipe_id()
            ),
        ));
    }
    let response_column = &formatter.api_columns().response;
    let mut summary = AnnotationSummary::default();

    let jobs: Vec<(String, String)> = rows
        .iter()
        .filter_map(|row| {
            let path = row.get(PATH_COLUMN).and_then(Value::as_str)?;
            let response = row.get(response_column).and_then(Value::as_str)?;
            (!response.is_empty()).then(|| (path.to_string(), response.to_string()))
        })
        .collect();
    summary.skipped = rows.len() - jobs.len();

    let fail_fast = formatter.base().error_policy == ErrorPolicy::FailFast;
    let aborted = AtomicBool::new(false);
    let aborted = &aborted;
    let mut results = futures::stream::iter(jobs)
        .map(|(path, response)| {
            // Checked when the job enters the worker window.
            let start = !aborted.load(Ordering::SeqCst);
            async move {
                if !start {
                    return (path, None);
                }
                let outcome =
                    annotate_one(formatter, annotator, input, output, &path, &response).await;
                (path, Some(outcome))
            }
        })
        .buffer_unordered(workers.max(1));

    let mut first_error = None;
    while let Some((path, outcome)) = results.next().await {
        match outcome {
            None => {}
            Some(Ok(())) => summary.succeeded += 1,
            Some(Err(err)) => {
                warn!(path = %path, error = %err, "could not annotate image");
                summary.failed += 1;
                if fail_fast && first_error.is_none() {
                    aborted.store(true, Ordering::SeqCst);
                    first_error = Some(err);
                }
            }
        }
    }
    if let Some(err) = first_error {
        warn!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Annotation pass aborted"
        );
        return Err(err);
    }

    if summary.failed > 0 {
        warn!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            "Annotated images saved with errors"
        );
    } else {
        info!(succeeded = summary.succeeded, "Annotated images saved");
    }
    Ok(summary)
}

async fn annotate_one(
    formatter: &ResponseFormatter,
    annotator: &ImageAnnotator,
    input: &dyn Folder,
    output: &dyn Folder,
    path: &str,
    response: &str,
) -> Result<()> {
    let data = input.download(path).await?;
    let image = decode_image(&data, path)?;
    let annotated = formatter.format_image(annotator, image, response)?;
    let encoded = encode_image(annotated, path)?;
    output.upload(path, encoded).await
}
