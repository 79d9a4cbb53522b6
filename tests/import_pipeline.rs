use std::io::Write;

use econoviz_lib::core::importer::{self, CsvRow, ImportError};
use econoviz_lib::db::{self, ObservationFilter};
use econoviz_lib::models::{MetricKind, NewMetric, RowError, SkipReason};
use sqlx::SqlitePool;
use tempfile::NamedTempFile;

const HEADER: &str = "metricName,industry,country,year,value\n";

async fn setup() -> SqlitePool {
    let pool = db::connect_in_memory().await.expect("in-memory db");

    let metric = |name: &str, kind: MetricKind, code: Option<&str>| NewMetric {
        name: name.to_string(),
        description: String::new(),
        industry: "Manufacturing".to_string(),
        unit: "t".to_string(),
        source: "Survey".to_string(),
        kind,
        indicator_code: code.map(str::to_string),
    };

    db::insert_metric(&pool, &metric("Steel Output", MetricKind::Manual, None))
        .await
        .unwrap();
    db::insert_metric(&pool, &metric("Exports", MetricKind::Live, Some("NE.EXP.GNFS.ZS")))
        .await
        .unwrap();
    pool
}

fn csv_file(body: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(HEADER.as_bytes()).unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn rows(body: &str) -> Vec<CsvRow> {
    importer::read_rows(format!("{HEADER}{body}").as_bytes()).unwrap()
}

fn assert_counters(summary: &econoviz_lib::models::ImportSummary) {
    assert_eq!(summary.processed, summary.inserted + summary.skipped);
    assert_eq!(summary.errors.len(), summary.skipped);
}

#[tokio::test]
async fn three_row_upload_reports_each_outcome() {
    let pool = setup().await;
    let upload = csv_file(
        "Steel Output,Manufacturing,India,2020,101.5\n\
         Copper Output,Manufacturing,India,2020,3\n\
         Steel Output,Manufacturing,India,2021,lots\n",
    );
    let path = upload.path().to_path_buf();

    let summary = importer::import_upload(&pool, upload).await.unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped, 2);
    assert_eq!(
        summary.errors,
        vec![
            RowError { row: 2, reason: SkipReason::MetricNotFound },
            RowError { row: 3, reason: SkipReason::InvalidFields },
        ]
    );
    assert!(!path.exists(), "upload must be removed after import");

    let filter = ObservationFilter {
        metric_name: "Steel Output",
        industry: "Manufacturing",
        ..ObservationFilter::default()
    };
    let stored = db::find_observations(&pool, &filter).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].country, "India");
    assert_eq!(stored[0].year, 2020);
    assert_eq!(stored[0].value, 101.5);
}

#[tokio::test]
async fn reimport_is_idempotent() {
    let pool = setup().await;
    let body = "Steel Output,Manufacturing,Brazil,2019,7\nSteel Output,Manufacturing,Brazil,2020,8\n";

    let first = importer::import_rows(&pool, &rows(body)).await;
    assert_eq!(first.inserted, 2);
    assert!(first.errors.is_empty());

    let second = importer::import_rows(&pool, &rows(body)).await;
    assert_eq!(second.inserted, 0);
    assert_eq!(second.skipped, 2);
    assert!(second.errors.iter().all(|e| e.reason == SkipReason::Duplicate));
    assert_counters(&second);

    assert_eq!(db::count_observations(&pool).await.unwrap(), 2);
}

#[tokio::test]
async fn duplicate_within_one_file_keeps_first_row() {
    let pool = setup().await;
    let summary = importer::import_rows(
        &pool,
        &rows("Steel Output,Manufacturing,Chile,2020,1\nSteel Output,Manufacturing,Chile,2020,2\n"),
    )
    .await;

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.errors, vec![RowError { row: 2, reason: SkipReason::Duplicate }]);
}

#[tokio::test]
async fn live_metric_rows_are_always_rejected() {
    let pool = setup().await;
    let summary = importer::import_rows(
        &pool,
        &rows("Exports,Manufacturing,India,2020,12\nExports,Manufacturing,India,2021,13\n"),
    )
    .await;

    assert_eq!(summary.inserted, 0);
    assert_eq!(
        summary.errors,
        vec![
            RowError { row: 1, reason: SkipReason::LiveMetric },
            RowError { row: 2, reason: SkipReason::LiveMetric },
        ]
    );
    assert_eq!(db::count_observations(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn industry_is_part_of_metric_identity() {
    let pool = setup().await;
    // Same name, wrong industry
    let summary = importer::import_rows(&pool, &rows("Steel Output,,India,2020,1\n")).await;

    assert_eq!(summary.errors, vec![RowError { row: 1, reason: SkipReason::MetricNotFound }]);
}

#[tokio::test]
async fn missing_header_column_rejects_whole_file() {
    let pool = setup().await;
    let mut upload = NamedTempFile::new().unwrap();
    upload
        .write_all(b"metricName,industry,year,value\nSteel Output,Manufacturing,2020,1\n")
        .unwrap();
    let path = upload.path().to_path_buf();

    let err = importer::import_upload(&pool, upload).await.unwrap_err();

    assert!(matches!(err, ImportError::MissingColumns(ref cols) if cols == "country"));
    assert!(err.is_client_error());
    assert!(!path.exists(), "upload must be removed even when parsing fails");
    assert_eq!(db::count_observations(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn empty_file_body_yields_empty_summary() {
    let pool = setup().await;
    let summary = importer::import_upload(&pool, csv_file("")).await.unwrap();

    assert_eq!(summary.processed, 0);
    assert!(summary.errors.is_empty());
}
