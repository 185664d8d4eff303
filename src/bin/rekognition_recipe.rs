//! rekognition-recipe: run one image recognition recipe over a folder of images.
//!
//! Usage:
//!   rekognition-recipe <recipe.yaml>       Run the recipe described by the file
//!   rekognition-recipe validate <recipe>   Check the recipe without calling the API

use anyhow::{bail, Context};
use rekognition_batch::annotate::ImageAnnotator;
use rekognition_batch::client::RekognitionApi;
use rekognition_batch::config::{RecipeConfig, ValidatedConfig};
use rekognition_batch::folder::{Folder, LocalFolder};
use rekognition_batch::recipe::{Recipe, RecipeIo};
use rekognition_batch::table::JsonLinesSink;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }
    init_tracing();

    let outcome = match args[1].as_str() {
        "version" | "--version" | "-V" => {
            println!("rekognition-recipe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "validate" => match args.get(2) {
            Some(path) => cmd_validate(Path::new(path)),
            None => Err(anyhow::anyhow!("validate needs a recipe file")),
        },
        path => cmd_run(Path::new(path)).await,
    };

    if let Err(err) = outcome {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"rekognition-recipe: batch image recognition

USAGE:
    rekognition-recipe <recipe.yaml>
    rekognition-recipe validate <recipe.yaml>

ENVIRONMENT:
    RUST_LOG                     Log filter (default: info)
    REKOGNITION_API_KEY          API key when none is stored in the keyring
    REKOGNITION_ENDPOINT         Endpoint override
    REKOGNITION_HTTP_TIMEOUT_SECS
                                 Per-request timeout"#
    );
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &Path) -> anyhow::Result<ValidatedConfig> {
    let config = RecipeConfig::from_path(path)
        .with_context(|| format!("loading {}", path.display()))?;
    Ok(config.validate()?)
}

fn cmd_validate(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    println!(
        "{}: OK ({} workers, {} calls per {}s, error handling {:?})",
        config.task.recipe_id(),
        config.workers,
        config.limits.max_calls,
        config.limits.period.as_secs(),
        config.error_policy
    );
    Ok(())
}

fn build_api(config: &ValidatedConfig) -> anyhow::Result<RekognitionApi> {
    let mut builder = RekognitionApi::builder().limits(config.limits.clone());
    if let Some(region) = &config.api.region {
        builder = builder.region(region.clone());
    }
    if let Some(endpoint) = &config.api.endpoint {
        builder = builder.endpoint(endpoint.clone());
    }
    if let Some(key) = &config.api.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(timeout) = config.api.timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

async fn cmd_run(path: &Path) -> anyhow::Result<()> {
    let config = load(path)?;
    if !config.input_folder.is_dir() {
        bail!(
            "input folder {} does not exist",
            config.input_folder.display()
        );
    }

    let api = build_api(&config)?;
    let mut input = LocalFolder::new(&config.input_folder);
    if let Some(location) = &config.input_s3 {
        input = input.with_s3_location(location.clone());
    }
    let output_folder = match &config.output_folder {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating {}", dir.display()))?;
            Some(LocalFolder::new(dir))
        }
        None => None,
    };
    let annotator = match &config.font_path {
        Some(font) => ImageAnnotator::with_font_path(font)?,
        None => ImageAnnotator::with_system_font(),
    };
    let mut sink = JsonLinesSink::create(&config.output_dataset)
        .with_context(|| format!("creating {}", config.output_dataset.display()))?;

    let report = Recipe::new(&config, &api, &annotator)
        .run(RecipeIo {
            input: &input,
            sink: &mut sink,
            output_folder: output_folder.as_ref().map(|f| f as &dyn Folder),
        })
        .await?;

    let descriptions = serde_json::to_string_pretty(&report.column_descriptions.as_json())?;
    std::fs::write(&config.column_descriptions, descriptions)
        .with_context(|| format!("writing {}", config.column_descriptions.display()))?;

    println!(
        "{} rows written to {} ({} failed calls)",
        report.rows_written,
        config.output_dataset.display(),
        report.failed_rows
    );
    if let Some(summary) = report.annotation {
        println!(
            "{} annotated images saved ({} failed, {} skipped)",
            summary.succeeded, summary.failed, summary.skipped
        );
    }
    Ok(())
}
