//! Whole recipe runs against an in-memory folder and a scripted remote client.

use async_trait::async_trait;
use base64::Engine as _;
use image::RgbImage;
use rekognition_batch::annotate::{decode_image, encode_image, ImageAnnotator};
use rekognition_batch::client::RekognitionApi;
use rekognition_batch::config::{RecipeConfig, ValidatedConfig};
use rekognition_batch::folder::{Folder, MemoryFolder};
use rekognition_batch::recipe::{Recipe, RecipeIo};
use rekognition_batch::table::MemoryTable;
use rekognition_batch::transport::{Operation, VisionClient};
use rekognition_batch::{Error, Result};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const BROKEN: &[u8] = b"definitely not a png";

/// Answers label detection for every image except [`BROKEN`].
#[derive(Default)]
struct ScriptedClient {
    calls: AtomicUsize,
}

#[async_trait]
impl VisionClient for ScriptedClient {
    async fn invoke(&self, operation: Operation, body: Value) -> Result<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let broken = base64::engine::general_purpose::STANDARD.encode(BROKEN);
        if body["Image"]["Bytes"] == json!(broken) {
            return Err(Error::Remote {
                status: 400,
                code: "InvalidImageFormatException".into(),
                message: "Request has invalid image format".into(),
                retryable: false,
            });
        }
        match operation {
            Operation::DetectLabels => Ok(json!({
                "Labels": [
                    {"Name": "Dog", "Confidence": 55.0},
                    {"Name": "Cat", "Confidence": 91.2, "Instances": [
                        {"Confidence": 91.2, "BoundingBox": {"Width": 0.5, "Height": 0.5, "Left": 0.25, "Top": 0.25}}
                    ]}
                ]
            })),
            other => Ok(json!({ "unexpected": other.name() })),
        }
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    encode_image(RgbImage::from_pixel(width, height, image::Rgb([200, 200, 200])), "x.png")
        .unwrap()
        .to_vec()
}

fn input_folder() -> MemoryFolder {
    let folder = MemoryFolder::new();
    folder.insert("/a.png", png(64, 48));
    folder.insert("/b.png", png(32, 32));
    folder.insert("/broken.png", BROKEN.to_vec());
    folder.insert("/c.png", png(40, 80));
    folder.insert("/notes.txt", b"ignored".to_vec());
    folder
}

fn config(error_handling: &str) -> ValidatedConfig {
    RecipeConfig::from_yaml_str(&format!(
        r#"
recipe: object_api
input_folder: /in
output_dataset: /out.jsonl
output_folder: /annotated
api:
  endpoint: http://localhost:1
  parallel_workers: 3
num_objects: 2
error_handling: {}
"#,
        error_handling
    ))
    .unwrap()
    .validate()
    .unwrap()
}

fn api(client: Arc<ScriptedClient>) -> RekognitionApi {
    RekognitionApi::builder()
        .client(client)
        .limits(
            rekognition_batch::RateLimiterConfig::new(100, Duration::from_millis(10)),
        )
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_object_recipe_writes_table_and_images() {
    let config = config("LOG");
    let client = Arc::new(ScriptedClient::default());
    let api = api(client.clone());
    let annotator = ImageAnnotator::new();
    let input = input_folder();
    let output = MemoryFolder::new();
    let table = MemoryTable::new();
    let mut sink = table.clone();

    let report = Recipe::new(&config, &api, &annotator)
        .run(RecipeIo {
            input: &input,
            sink: &mut sink,
            output_folder: Some(&output),
        })
        .await
        .unwrap();

    assert_eq!(client.calls.load(Ordering::SeqCst), 4);
    assert_eq!(report.rows_written, 4);
    assert_eq!(report.failed_rows, 1);
    assert!(table.is_closed());
    assert_eq!(
        table.schema().unwrap(),
        vec![
            "path",
            "object_api_label_list",
            "object_api_label_1_name",
            "object_api_label_1_score",
            "object_api_label_2_name",
            "object_api_label_2_score",
            "object_api_response",
            "object_api_error_message",
            "object_api_error_type",
        ]
    );

    let rows = table.rows();
    let paths: Vec<&str> = rows.iter().map(|r| r["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["/a.png", "/b.png", "/broken.png", "/c.png"]);
    assert_eq!(rows[0]["object_api_label_1_name"], json!("Cat"));
    assert_eq!(rows[0]["object_api_label_2_name"], json!("Dog"));
    assert_eq!(rows[0]["object_api_error_type"], json!(""));
    assert_eq!(rows[2]["object_api_label_list"], json!(""));
    assert_eq!(
        rows[2]["object_api_error_type"],
        json!("InvalidImageFormatException")
    );

    let summary = report.annotation.unwrap();
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(output.len(), 3);
    let annotated = decode_image(&output.get("/c.png").unwrap(), "/c.png").unwrap();
    assert_eq!(annotated.dimensions(), (40, 80));
    assert!(output.get("/broken.png").is_none());

    assert!(report
        .column_descriptions
        .get("object_api_label_1_score")
        .is_some());
}

#[tokio::test]
async fn test_fail_policy_aborts_before_writing() {
    let config = config("FAIL");
    let api = api(Arc::new(ScriptedClient::default()));
    let annotator = ImageAnnotator::new();
    let input = input_folder();
    let table = MemoryTable::new();
    let mut sink = table.clone();

    let err = Recipe::new(&config, &api, &annotator)
        .run(RecipeIo {
            input: &input,
            sink: &mut sink,
            output_folder: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::BatchAborted { .. }));
    assert_eq!(err.kind_name(), "InvalidImageFormatException");
    assert!(table.schema().is_none());
    assert!(table.rows().is_empty());
}

#[tokio::test]
async fn test_folder_without_images_is_configuration_error() {
    let config = config("LOG");
    let client = Arc::new(ScriptedClient::default());
    let api = api(client.clone());
    let annotator = ImageAnnotator::new();
    let input = MemoryFolder::new();
    input.insert("/readme.md", b"# nothing here".to_vec());
    let mut sink = MemoryTable::new();

    let err = Recipe::new(&config, &api, &annotator)
        .run(RecipeIo {
            input: &input,
            sink: &mut sink,
            output_folder: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Configuration { .. }));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(input.name(), "memory");
}
