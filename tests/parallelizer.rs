//! Parallel execution and rate limiting, end to end with simulated remote calls.

use rekognition_batch::batch::{ErrorPolicy, Parallelizer};
use rekognition_batch::resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
use rekognition_batch::table::{ApiColumnNames, ColumnNameRegistry, Row};
use rekognition_batch::Error;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn columns() -> ApiColumnNames {
    let mut registry = ColumnNameRegistry::new("object_api", ["path"]);
    ApiColumnNames::resolve(&mut registry).unwrap()
}

fn rows(n: usize) -> Vec<Row> {
    (0..n)
        .map(|i| {
            let mut row = Row::new();
            row.insert("path".into(), json!(format!("/img_{:03}.png", i)));
            row
        })
        .collect()
}

fn index_of(row: &Row) -> usize {
    row["path"].as_str().unwrap()[5..8].parse().unwrap()
}

#[tokio::test]
async fn test_output_order_matches_input_despite_completion_order() {
    let parallelizer = Parallelizer::new(8, ErrorPolicy::LogAndContinue).unwrap();
    let cols = columns();

    let out = parallelizer
        .run(rows(40), &cols, |row| async move {
            let i = index_of(&row);
            // Later rows finish first.
            tokio::time::sleep(Duration::from_millis(((40 - i) % 7) as u64 * 3)).await;
            Ok(format!("{{\"i\":{}}}", i))
        })
        .await
        .unwrap();

    assert_eq!(out.len(), 40);
    for (i, row) in out.iter().enumerate() {
        assert_eq!(index_of(row), i);
        assert_eq!(row[&cols.response], json!(format!("{{\"i\":{}}}", i)));
        assert_eq!(row[&cols.error_message], json!(""));
        assert_eq!(row[&cols.error_type], json!(""));
    }
}

#[tokio::test]
async fn test_log_policy_isolates_failures() {
    let parallelizer = Parallelizer::new(4, ErrorPolicy::LogAndContinue).unwrap();
    let cols = columns();
    let calls = AtomicUsize::new(0);

    let out = parallelizer
        .run(rows(10), &cols, |row| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                let i = index_of(&row);
                if i % 3 == 0 {
                    Err(Error::Remote {
                        status: 400,
                        code: "InvalidImageFormatException".into(),
                        message: format!("bad image {}", i),
                        retryable: false,
                    })
                } else {
                    Ok("{}".to_string())
                }
            }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(parallelizer.progress().completed(), 10);
    for (i, row) in out.iter().enumerate() {
        if i % 3 == 0 {
            assert_eq!(row[&cols.response], json!(""));
            assert_eq!(row[&cols.error_message], json!(format!("bad image {}", i)));
            assert_eq!(row[&cols.error_type], json!("InvalidImageFormatException"));
        } else {
            assert_eq!(row[&cols.response], json!("{}"));
            assert_eq!(row[&cols.error_type], json!(""));
        }
    }
}

#[tokio::test]
async fn test_fail_policy_aborts_and_stops_dispatch() {
    let parallelizer = Parallelizer::new(2, ErrorPolicy::FailFast).unwrap();
    let cols = columns();
    let calls = AtomicUsize::new(0);

    let result = parallelizer
        .run(rows(50), &cols, |row| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if index_of(&row) == 3 {
                    Err(Error::Remote {
                        status: 403,
                        code: "AccessDeniedException".into(),
                        message: "denied".into(),
                        retryable: false,
                    })
                } else {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    Ok("{}".to_string())
                }
            }
        })
        .await;

    match result {
        Err(Error::BatchAborted {
            index,
            kind,
            message,
        }) => {
            assert_eq!(index, 3);
            assert_eq!(kind, "AccessDeniedException");
            assert_eq!(message, "denied");
        }
        other => panic!("expected an aborted batch, got {:?}", other.map(|r| r.len())),
    }
    // At most the calls already in flight when the failure was seen.
    assert!(calls.load(Ordering::SeqCst) < 50);
}

#[tokio::test]
async fn test_worker_count_bounds_in_flight_calls() {
    let parallelizer = Parallelizer::new(3, ErrorPolicy::LogAndContinue).unwrap();
    let cols = columns();
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    parallelizer
        .run(rows(20), &cols, |_row| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok("{}".to_string())
            }
        })
        .await
        .unwrap();

    assert!(peak.load(Ordering::SeqCst) <= 3);
    assert!(peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_rate_limiter_shared_by_workers() {
    // 5 calls per 200ms: the 6th call must wait for the window to slide.
    let limiter = Arc::new(RateLimiter::new(RateLimiterConfig::new(
        5,
        Duration::from_millis(200),
    )));
    let parallelizer = Parallelizer::new(6, ErrorPolicy::LogAndContinue).unwrap();
    let cols = columns();
    let started = Instant::now();

    parallelizer
        .run(rows(6), &cols, |_row| {
            let limiter = Arc::clone(&limiter);
            async move {
                limiter.acquire().await?;
                Ok("{}".to_string())
            }
        })
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(200));
}
