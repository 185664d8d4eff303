//! Order-preserving, bounded-concurrency fan-out of one remote call per row.

use crate::table::{empty_cell, ApiColumnNames, Row};
use crate::{Error, Result};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{info, warn};

pub const MIN_WORKERS: usize = 1;
pub const MAX_WORKERS: usize = 100;
pub const DEFAULT_WORKERS: usize = 4;

/// What to do when a row fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Abort dispatch on the first failure and return it.
    #[serde(rename = "FAIL", alias = "fail", alias = "FAIL_FAST")]
    FailFast,
    /// Record the failure in the row's error columns and keep going.
    #[default]
    #[serde(rename = "LOG", alias = "log", alias = "LOG_AND_CONTINUE")]
    LogAndContinue,
}

/// Outcome of the remote call for one row.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCallResult {
    /// Raw JSON response text.
    Success(String),
    Error { message: String, kind: String },
}

impl ApiCallResult {
    pub fn from_error(err: &Error) -> Self {
        Self::Error {
            message: err.message(),
            kind: err.kind_name(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Write the response and error columns onto `row`.
    pub fn apply(&self, row: &mut Row, columns: &ApiColumnNames) {
        let (response, message, kind) = match self {
            Self::Success(raw) => (Value::String(raw.clone()), empty_cell(), empty_cell()),
            Self::Error { message, kind } => (
                empty_cell(),
                Value::String(message.clone()),
                Value::String(kind.clone()),
            ),
        };
        row.insert(columns.response.clone(), response);
        row.insert(columns.error_message.clone(), message);
        row.insert(columns.error_type.clone(), kind);
    }
}

/// Completed-row counter, readable while a run is in flight.
#[derive(Debug, Default)]
pub struct Progress {
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl Progress {
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    fn reset(&self, total: usize) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(0, Ordering::SeqCst);
    }

    fn increment(&self) -> usize {
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Clone)]
pub struct Parallelizer {
    workers: usize,
    error_policy: ErrorPolicy,
    progress: Arc<Progress>,
}

impl Parallelizer {
    pub fn new(workers: usize, error_policy: ErrorPolicy) -> Result<Self> {
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&workers) {
            return Err(Error::configuration(
                "parallel_workers",
                format!(
                    "Concurrency must be between {} and {}, got {}",
                    MIN_WORKERS, MAX_WORKERS, workers
                ),
            ));
        }
        Ok(Self {
            workers,
            error_policy,
            progress: Arc::new(Progress::default()),
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Shared handle; reset at the start of every run.
    pub fn progress(&self) -> Arc<Progress> {
        Arc::clone(&self.progress)
    }

    /// Call `call` once per row, at most `workers` at a time.
    ///
    /// The returned outcomes are in input order. Under [`ErrorPolicy::FailFast`] the first
    /// observed failure is returned as [`Error::BatchAborted`]; rows not yet started are
    /// skipped but calls already in flight run to completion.
    pub async fn call_all<F, Fut>(&self, rows: &[Row], call: F) -> Result<Vec<ApiCallResult>>
    where
        F: Fn(Row) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let total = rows.len();
        self.progress.reset(total);
        if total == 0 {
            return Ok(Vec::new());
        }

        let fail_fast = self.error_policy == ErrorPolicy::FailFast;
        let aborted = AtomicBool::new(false);
        let first_failure: Mutex<Option<Error>> = Mutex::new(None);
        let log_every = (total / 10).max(1);
        let started = Instant::now();
        let call = &call;
        let aborted_ref = &aborted;
        let first_failure_ref = &first_failure;
        let progress = &self.progress;

        let results: Vec<(usize, Option<ApiCallResult>)> =
            futures::stream::iter(rows.iter().cloned().enumerate())
                .map(|(idx, row)| async move {
                    if fail_fast && aborted_ref.load(Ordering::SeqCst) {
                        return (idx, None);
                    }
                    let outcome = call(row).await;
                    let done = progress.increment();
                    if done % log_every == 0 || done == total {
                        info!(completed = done, total, "API calls progress");
                    }
                    match outcome {
                        Ok(raw) => (idx, Some(ApiCallResult::Success(raw))),
                        Err(err) => {
                            warn!(row = idx, kind = %err.kind_name(), error = %err, "API call failed");
                            let result = ApiCallResult::from_error(&err);
                            if fail_fast && !aborted_ref.swap(true, Ordering::SeqCst) {
                                if let Ok(mut slot) = first_failure_ref.lock() {
                                    *slot = Some(Error::BatchAborted {
                                        index: idx,
                                        kind: err.kind_name(),
                                        message: err.message(),
                                    });
                                }
                            }
                            (idx, Some(result))
                        }
                    }
                })
                .buffer_unordered(self.workers)
                .collect()
                .await;

        if aborted.load(Ordering::SeqCst) {
            let err = first_failure
                .into_inner()
                .ok()
                .flatten()
                .unwrap_or_else(|| Error::BatchAborted {
                    index: 0,
                    kind: "RuntimeError".to_string(),
                    message: "batch aborted".to_string(),
                });
            warn!(
                completed = self.progress.completed(),
                total,
                error = %err,
                "batch aborted on first failure"
            );
            return Err(err);
        }

        let mut out: Vec<Option<ApiCallResult>> = (0..total).map(|_| None).collect();
        for (idx, r) in results {
            out[idx] = r;
        }
        let out: Vec<ApiCallResult> = out
            .into_iter()
            .map(|o| {
                o.unwrap_or_else(|| ApiCallResult::Error {
                    message: "no result recorded for row".to_string(),
                    kind: "RuntimeError".to_string(),
                })
            })
            .collect();

        let failures = out.iter().filter(|r| !r.is_success()).count();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if failures > 0 {
            warn!(
                failures,
                total,
                elapsed_ms,
                "API calls finished: {} rows failed, see the error columns",
                failures
            );
        } else {
            info!(total, elapsed_ms, "API calls finished without errors");
        }
        Ok(out)
    }

    /// Run the calls and merge each outcome back into its row.
    ///
    /// Output rows keep the input order and original columns; the response and error
    /// columns are appended.
    pub async fn run<F, Fut>(
        &self,
        rows: Vec<Row>,
        columns: &ApiColumnNames,
        call: F,
    ) -> Result<Vec<Row>>
    where
        F: Fn(Row) -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let results = self.call_all(&rows, call).await?;
        Ok(rows
            .into_iter()
            .zip(results)
            .map(|(mut row, result)| {
                result.apply(&mut row, columns);
                row
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cols() -> ApiColumnNames {
        ApiColumnNames {
            response: "api_response".into(),
            error_message: "api_error_message".into(),
            error_type: "api_error_type".into(),
        }
    }

    #[test]
    fn test_worker_bounds() {
        assert!(Parallelizer::new(0, ErrorPolicy::LogAndContinue).is_err());
        assert!(Parallelizer::new(101, ErrorPolicy::LogAndContinue).is_err());
        assert!(Parallelizer::new(1, ErrorPolicy::FailFast).is_ok());
        assert!(Parallelizer::new(100, ErrorPolicy::FailFast).is_ok());
    }

    #[test]
    fn test_error_policy_names() {
        let p: ErrorPolicy = serde_yaml::from_str("FAIL").unwrap();
        assert_eq!(p, ErrorPolicy::FailFast);
        let p: ErrorPolicy = serde_yaml::from_str("LOG_AND_CONTINUE").unwrap();
        assert_eq!(p, ErrorPolicy::LogAndContinue);
    }

    #[test]
    fn test_apply_failure_leaves_response_empty() {
        let mut row = Row::new();
        row.insert("path".into(), json!("/a.png"));
        ApiCallResult::Error {
            message: "boom".into(),
            kind: "InvalidImageFormatException".into(),
        }
        .apply(&mut row, &cols());
        assert_eq!(row["api_response"], json!(""));
        assert_eq!(row["api_error_message"], json!("boom"));
        assert_eq!(row["api_error_type"], json!("InvalidImageFormatException"));
    }

    #[tokio::test]
    async fn test_empty_input_skips_calls() {
        let calls = AtomicUsize::new(0);
        let p = Parallelizer::new(4, ErrorPolicy::FailFast).unwrap();
        let out = p
            .run(Vec::new(), &cols(), |_row| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(String::new()) }
            })
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
