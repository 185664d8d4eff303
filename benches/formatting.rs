//! Benchmarks for response formatting and batch dispatch
//!
//! This benchmark measures:
//! - Formatting a table of label detection responses
//! - Parallelizer overhead with instant remote calls

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use rekognition_batch::batch::{ErrorPolicy, Parallelizer};
use rekognition_batch::formatting::{ResponseFormatter, TaskSettings};
use rekognition_batch::table::{ApiColumnNames, ColumnNameRegistry, Row};
use serde_json::json;

fn labels_response(n: usize) -> String {
    let labels: Vec<_> = (0..n)
        .map(|i| {
            json!({
                "Name": format!("Label {}", i),
                "Confidence": 50.0 + (i % 50) as f64,
                "Instances": [{
                    "Confidence": 70.0,
                    "BoundingBox": {"Width": 0.1, "Height": 0.1, "Left": 0.2, "Top": 0.3}
                }]
            })
        })
        .collect();
    json!({ "Labels": labels }).to_string()
}

fn setup(num_objects: usize) -> (ResponseFormatter, ApiColumnNames) {
    let mut registry = ColumnNameRegistry::new("object_api", ["path"]);
    let api = ApiColumnNames::resolve(&mut registry).unwrap();
    let formatter = ResponseFormatter::new(
        TaskSettings::ObjectDetection {
            num_objects,
            orientation_correction: false,
        },
        &mut registry,
        api.clone(),
        ErrorPolicy::LogAndContinue,
    )
    .unwrap();
    (formatter, api)
}

fn table(api: &ApiColumnNames, rows: usize, labels: usize) -> Vec<Row> {
    let raw = labels_response(labels);
    (0..rows)
        .map(|i| {
            let mut row = Row::new();
            row.insert("path".into(), json!(format!("/img_{}.jpg", i)));
            row.insert(api.response.clone(), json!(raw));
            row.insert(api.error_message.clone(), json!(""));
            row.insert(api.error_type.clone(), json!(""));
            row
        })
        .collect()
}

fn bench_format_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_table");

    for labels in [5usize, 50] {
        let (formatter, api) = setup(10);
        let rows = table(&api, 200, labels);
        group.throughput(Throughput::Elements(rows.len() as u64));
        group.bench_with_input(BenchmarkId::new("labels", labels), &rows, |b, rows| {
            b.iter(|| formatter.format_table(black_box(rows)).unwrap())
        });
    }

    group.finish();
}

fn bench_annotation_boxes(c: &mut Criterion) {
    let (formatter, _) = setup(10);
    let raw = labels_response(50);

    c.bench_function("annotation_boxes", |b| {
        b.iter(|| formatter.annotation(black_box(&raw)).unwrap())
    });
}

fn bench_parallelizer(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (_, api) = setup(1);
    let rows = table(&api, 500, 0);
    let mut group = c.benchmark_group("parallelizer");
    group.throughput(Throughput::Elements(rows.len() as u64));

    for workers in [1usize, 16] {
        let parallelizer = Parallelizer::new(workers, ErrorPolicy::LogAndContinue).unwrap();
        group.bench_with_input(BenchmarkId::new("workers", workers), &rows, |b, rows| {
            b.to_async(&runtime).iter(|| async {
                parallelizer
                    .run(rows.clone(), &api, |_row| async { Ok("{}".to_string()) })
                    .await
                    .unwrap()
            })
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_format_table,
    bench_annotation_boxes,
    bench_parallelizer
);
criterion_main!(benches);
