//! # rekognition-batch
//!
//! Batch connectors that run a folder of images through a remote image-analysis API
//! (object detection, text detection, unsafe content moderation) and write the results
//! as a table, optionally with annotated copies of the images.
//!
//! ## Overview
//!
//! Every image becomes one row. Rows are sent to the API by a bounded pool of workers
//! sharing one rate limiter and one retry policy; responses are kept in the row as raw
//! JSON and then turned into typed columns by a task-specific formatter. Output rows
//! keep the input order whatever order calls complete in.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rekognition_batch::annotate::ImageAnnotator;
//! use rekognition_batch::client::RekognitionApi;
//! use rekognition_batch::config::RecipeConfig;
//! use rekognition_batch::folder::LocalFolder;
//! use rekognition_batch::recipe::{Recipe, RecipeIo};
//! use rekognition_batch::table::JsonLinesSink;
//!
//! #[tokio::main]
//! async fn main() -> rekognition_batch::Result<()> {
//!     let config = RecipeConfig::from_path("recipe.yaml")?.validate()?;
//!     let api = RekognitionApi::builder()
//!         .region("eu-west-1")
//!         .limits(config.limits.clone())
//!         .build()?;
//!     let input = LocalFolder::new(&config.input_folder);
//!     let mut sink = JsonLinesSink::create(&config.output_dataset)?;
//!     let annotator = ImageAnnotator::with_system_font();
//!
//!     let report = Recipe::new(&config, &api, &annotator)
//!         .run(RecipeIo { input: &input, sink: &mut sink, output_folder: None })
//!         .await?;
//!     println!("{} rows written", report.rows_written);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`resilience`] | Sliding-window rate limiter and retrying caller |
//! | [`batch`] | Order-preserving parallel execution with FAIL / LOG policies |
//! | [`transport`] | Remote operation trait and its HTTP implementation |
//! | [`client`] | Rate-limited, retried API wrapper building image requests |
//! | [`types`] | Typed API responses and moderation category catalogs |
//! | [`formatting`] | Response formatters per task, annotated image output |
//! | [`annotate`] | Bounding-box and caption drawing |
//! | [`table`] | Rows, column naming and table sinks |
//! | [`folder`] | Image folders (local, in-memory) |
//! | [`config`] | Recipe configuration loading and validation |
//! | [`recipe`] | End-to-end recipe runner |

pub mod annotate;
pub mod batch;
pub mod client;
pub mod config;
pub mod error_code;
pub mod folder;
pub mod formatting;
pub mod recipe;
pub mod resilience;
pub mod table;
pub mod transport;
pub mod types;

pub use batch::{ErrorPolicy, Parallelizer};
pub use client::{RekognitionApi, RekognitionApiBuilder};
pub use formatting::{ResponseFormatter, TaskKind, TaskSettings};
pub use resilience::rate_limiter::{RateLimiter, RateLimiterConfig};
pub use resilience::retry::{RetryConfig, RetryingCaller};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
