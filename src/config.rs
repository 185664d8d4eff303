//! Recipe configuration.
//!
//! A recipe is described by a YAML (or JSON) document and validated into a
//! [`ValidatedConfig`] before anything touches the network:
//!
//! ```yaml
//! recipe: object_api
//! input_folder: ./images
//! output_dataset: ./labels.jsonl
//! output_folder: ./annotated
//! api:
//!   region: eu-west-1
//!   quota_rate_limit: 1800
//!   quota_period: 60
//!   parallel_workers: 4
//! num_objects: 5
//! minimum_score: 0.5
//! orientation_correction: true
//! error_handling: LOG
//! ```

use crate::batch::{ErrorPolicy, DEFAULT_WORKERS, MAX_WORKERS, MIN_WORKERS};
use crate::client::ImageRequestOptions;
use crate::folder::S3Location;
use crate::formatting::{TaskKind, TaskSettings};
use crate::resilience::rate_limiter::{RateLimitMode, RateLimiterConfig};
use crate::types::{CategoryLevel, ModerationCategory};
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

const DEFAULT_NUM_OBJECTS: usize = 10;

fn default_quota_rate_limit() -> u32 {
    1800
}

fn default_quota_period() -> u64 {
    60
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

/// Connection and throughput settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiPreset {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Prefer the keyring or `REKOGNITION_API_KEY` over putting the key here.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_quota_rate_limit")]
    pub quota_rate_limit: u32,
    /// Seconds.
    #[serde(default = "default_quota_period")]
    pub quota_period: u64,
    #[serde(default = "default_workers")]
    pub parallel_workers: usize,
    #[serde(default)]
    pub rate_limit_mode: RateLimitMode,
}

impl Default for ApiPreset {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            api_key: None,
            timeout_secs: None,
            quota_rate_limit: default_quota_rate_limit(),
            quota_period: default_quota_period(),
            parallel_workers: default_workers(),
            rate_limit_mode: RateLimitMode::default(),
        }
    }
}

/// Raw recipe document, as written by users.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecipeConfig {
    pub recipe: TaskKind,
    pub input_folder: PathBuf,
    /// Set when the input folder mirrors a bucket the remote API can read directly.
    #[serde(default)]
    pub input_s3: Option<S3Settings>,
    pub output_dataset: PathBuf,
    #[serde(default)]
    pub output_folder: Option<PathBuf>,
    /// Defaults to `<output_dataset>.columns.json`.
    #[serde(default)]
    pub column_descriptions: Option<PathBuf>,
    /// Defaults to the recipe id.
    #[serde(default)]
    pub column_prefix: Option<String>,
    #[serde(default)]
    pub api: ApiPreset,
    #[serde(default)]
    pub error_handling: ErrorPolicy,
    #[serde(default)]
    pub minimum_score: f64,
    #[serde(default)]
    pub num_objects: Option<usize>,
    #[serde(default)]
    pub orientation_correction: bool,
    #[serde(default)]
    pub category_level: CategoryLevel,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct S3Settings {
    pub bucket: String,
    #[serde(default)]
    pub root_path: String,
}

/// Connection settings after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<Duration>,
}

/// Everything a run needs, checked.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub task: TaskKind,
    pub settings: TaskSettings,
    pub request: ImageRequestOptions,
    pub column_prefix: String,
    pub error_policy: ErrorPolicy,
    pub workers: usize,
    pub limits: RateLimiterConfig,
    pub api: ApiSettings,
    pub input_folder: PathBuf,
    pub input_s3: Option<S3Location>,
    pub output_dataset: PathBuf,
    pub output_folder: Option<PathBuf>,
    pub column_descriptions: PathBuf,
    pub font_path: Option<PathBuf>,
}

impl RecipeConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            Error::configuration_with_context(
                format!("Invalid recipe configuration: {}", e),
                ErrorContext::new().with_source("config_loader"),
            )
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("Cannot read recipe configuration: {}", e),
                ErrorContext::new()
                    .with_details(path.display().to_string())
                    .with_source("config_loader"),
            )
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<ValidatedConfig> {
        let api = &self.api;
        let limits = RateLimiterConfig::from_quota(api.quota_rate_limit, api.quota_period)
            .ok_or_else(|| {
                Error::configuration(
                    "api.quota_rate_limit",
                    "API quota rate limit and period must both be at least 1",
                )
            })?
            .with_mode(api.rate_limit_mode);
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&api.parallel_workers) {
            return Err(Error::configuration(
                "api.parallel_workers",
                format!(
                    "Concurrency must be between {} and {}",
                    MIN_WORKERS, MAX_WORKERS
                ),
            ));
        }
        if api.region.is_none() && api.endpoint.is_none() {
            return Err(Error::configuration(
                "api.region",
                "Please specify a region or an endpoint",
            ));
        }
        if !(0.0..=1.0).contains(&self.minimum_score) {
            return Err(Error::configuration(
                "minimum_score",
                "Minimum confidence score must be between 0 and 1",
            ));
        }
        if self.input_folder.as_os_str().is_empty() {
            return Err(Error::configuration("input_folder", "Please specify input folder"));
        }
        if self.output_dataset.as_os_str().is_empty() {
            return Err(Error::configuration(
                "output_dataset",
                "Please specify output dataset",
            ));
        }
        if self.output_folder.is_some() && !self.recipe.produces_images() {
            return Err(Error::configuration(
                "output_folder",
                format!("{} does not produce annotated images", self.recipe.recipe_id()),
            ));
        }

        let settings = match self.recipe {
            TaskKind::ObjectDetection => {
                let num_objects = self.num_objects.unwrap_or(DEFAULT_NUM_OBJECTS);
                if num_objects < 1 {
                    return Err(Error::configuration(
                        "num_objects",
                        "Number of labels must be at least 1",
                    ));
                }
                TaskSettings::ObjectDetection {
                    num_objects,
                    orientation_correction: self.orientation_correction,
                }
            }
            TaskKind::TextDetection => TaskSettings::TextDetection {
                minimum_score: self.minimum_score,
                orientation_correction: self.orientation_correction,
            },
            TaskKind::ContentModeration => {
                let categories = self
                    .categories
                    .iter()
                    .map(|c| ModerationCategory::parse(self.category_level, c))
                    .collect::<Result<Vec<_>>>()?;
                if categories.is_empty() {
                    return Err(Error::configuration(
                        "categories",
                        "Choose at least one unsafe content category",
                    ));
                }
                TaskSettings::ContentModeration {
                    level: self.category_level,
                    categories,
                }
            }
        };

        let request = ImageRequestOptions {
            // The moderation formatter never reads the orientation.
            orientation_correction: self.orientation_correction
                && self.recipe.produces_images(),
            num_objects: match &settings {
                TaskSettings::ObjectDetection { num_objects, .. } => Some(*num_objects as u32),
                _ => None,
            },
            minimum_score: Some(self.minimum_score),
        };

        let column_prefix = match &self.column_prefix {
            Some(p) if p.trim().is_empty() => {
                return Err(Error::configuration(
                    "column_prefix",
                    "Column prefix cannot be empty",
                ))
            }
            Some(p) => p.clone(),
            None => self.recipe.recipe_id().to_string(),
        };

        let column_descriptions = self.column_descriptions.clone().unwrap_or_else(|| {
            let mut name = self.output_dataset.clone().into_os_string();
            name.push(".columns.json");
            PathBuf::from(name)
        });

        let validated = ValidatedConfig {
            task: self.recipe,
            settings,
            request,
            column_prefix,
            error_policy: self.error_handling,
            workers: api.parallel_workers,
            limits,
            api: ApiSettings {
                region: api.region.clone(),
                endpoint: api.endpoint.clone(),
                api_key: api.api_key.clone(),
                timeout: api.timeout_secs.map(Duration::from_secs),
            },
            input_folder: self.input_folder.clone(),
            input_s3: self
                .input_s3
                .as_ref()
                .map(|s| S3Location::new(s.bucket.clone(), s.root_path.clone())),
            output_dataset: self.output_dataset.clone(),
            output_folder: self.output_folder.clone(),
            column_descriptions,
            font_path: self.font_path.clone(),
        };
        info!(
            recipe = validated.task.recipe_id(),
            workers = validated.workers,
            quota = validated.limits.max_calls,
            period_secs = api.quota_period,
            error_handling = ?validated.error_policy,
            "Validated recipe configuration"
        );
        Ok(validated)
    }
}
