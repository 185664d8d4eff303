//! # Batch Module
//!
//! Bounded-concurrency, order-preserving execution of one remote call per row.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Parallelizer`] | Fans rows out to at most N in-flight calls |
//! | [`ErrorPolicy`] | `FAIL` (abort on first failure) or `LOG` (isolate failures) |
//! | [`ApiCallResult`] | Per-row success / error outcome |
//! | [`Progress`] | Completed counter observable during a run |
//!
//! ```rust
//! use rekognition_batch::batch::{ErrorPolicy, Parallelizer};
//! use rekognition_batch::table::{ApiColumnNames, ColumnNameRegistry, Row};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut registry = ColumnNameRegistry::new("object_api", std::iter::empty());
//!     let columns = ApiColumnNames::resolve(&mut registry).unwrap();
//!     let parallelizer = Parallelizer::new(4, ErrorPolicy::LogAndContinue).unwrap();
//!
//!     let rows = vec![Row::new(), Row::new()];
//!     let out = parallelizer
//!         .run(rows, &columns, |_row| async { Ok("{}".to_string()) })
//!         .await
//!         .unwrap();
//!     assert_eq!(out.len(), 2);
//!     assert_eq!(out[0][&columns.response], "{}");
//! }
//! ```

mod parallelizer;

pub use parallelizer::{
    ApiCallResult, ErrorPolicy, Parallelizer, Progress, DEFAULT_WORKERS, MAX_WORKERS,
    MIN_WORKERS,
};
