//! CSV batch import of manual metric observations.
//!
//! File-level problems (type, header, unreadable stream) abort the import
//! before any row is touched. Row-level problems never abort: each row is
//! attempted independently and ends up either inserted or skipped with a
//! reason in the [`ImportSummary`]. Already inserted rows are never rolled back.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use sqlx::SqlitePool;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db;
use crate::models::{ImportSummary, MetricKind, NewObservation, SkipReason};

pub const REQUIRED_COLUMNS: [&str; 5] = ["metricName", "industry", "country", "year", "value"];

const ALLOWED_CONTENT_TYPES: [&str; 2] = ["text/csv", "application/vnd.ms-excel"];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Only CSV files are accepted.")]
    UnsupportedFileType,

    #[error("CSV header is missing column(s): {0}. Expected metricName,industry,country,year,value.")]
    MissingColumns(String),

    #[error("Unreadable CSV file: {0}")]
    Csv(#[from] csv::Error),

    #[error("Upload I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ImportError {
    /// Whether the problem lies with the uploaded file rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedFileType | ImportError::MissingColumns(_) | ImportError::Csv(_)
        )
    }
}

/// Raw cells of one data row, untrimmed. Missing cells read as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsvRow {
    pub metric_name: String,
    pub industry: String,
    pub country: String,
    pub year: String,
    pub value: String,
}

/// Rejects uploads that are not CSV by extension or declared media type.
pub fn validate_upload(file_name: &str, content_type: Option<&str>) -> Result<(), ImportError> {
    let is_csv_name = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if !is_csv_name {
        return Err(ImportError::UnsupportedFileType);
    }

    if let Some(content_type) = content_type.map(str::trim).filter(|ct| !ct.is_empty()) {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !ALLOWED_CONTENT_TYPES.contains(&essence.as_str()) {
            return Err(ImportError::UnsupportedFileType);
        }
    }

    Ok(())
}

/// Reads every data row. The header must name all [`REQUIRED_COLUMNS`], in any order.
pub fn read_rows<R: Read>(reader: R) -> Result<Vec<CsvRow>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = rdr.headers()?.clone();
    let position = |column: &str| {
        headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == column)
    };

    let mut indices = [0usize; 5];
    let mut missing = Vec::new();
    for (slot, column) in indices.iter_mut().zip(REQUIRED_COLUMNS) {
        match position(column) {
            Some(idx) => *slot = idx,
            None => missing.push(column),
        }
    }
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing.join(", ")));
    }

    let [name_idx, industry_idx, country_idx, year_idx, value_idx] = indices;
    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let cell = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        rows.push(CsvRow {
            metric_name: cell(name_idx),
            industry: cell(industry_idx),
            country: cell(country_idx),
            year: cell(year_idx),
            value: cell(value_idx),
        });
    }

    debug!("Parsed {} CSV data rows", rows.len());
    Ok(rows)
}

pub fn read_rows_from_path(path: &Path) -> Result<Vec<CsvRow>, ImportError> {
    read_rows(File::open(path)?)
}

/// Validates and normalizes one row. `None` means missing or invalid fields.
pub fn parse_row(row: &CsvRow) -> Option<NewObservation> {
    let metric_name = row.metric_name.trim();
    let country = row.country.trim();
    if metric_name.is_empty() || country.is_empty() {
        return None;
    }

    // Year 0 is not a meaningful observation year
    let year = row.year.trim().parse::<i32>().ok().filter(|y| *y != 0)?;
    let value = row.value.trim().parse::<f64>().ok().filter(|v| v.is_finite())?;

    Some(NewObservation {
        metric_name: metric_name.to_string(),
        industry: row.industry.trim().to_string(),
        country: country.to_string(),
        year,
        value,
    })
}

/// Validates each row against the catalog and inserts the valid ones.
pub async fn import_rows(pool: &SqlitePool, rows: &[CsvRow]) -> ImportSummary {
    let mut summary = ImportSummary::default();
    // (name, industry) -> kind, None when the metric does not exist
    let mut catalog: HashMap<(String, String), Option<MetricKind>> = HashMap::new();

    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + 1;

        // 1. Field validation
        let Some(obs) = parse_row(row) else {
            summary.record_skipped(row_number, SkipReason::InvalidFields);
            continue;
        };

        // 2. Catalog lookup (memoised per import)
        let key = (obs.metric_name.clone(), obs.industry.clone());
        let kind = match catalog.get(&key).copied() {
            Some(kind) => kind,
            None => match db::find_metric_by_name(pool, &obs.metric_name, &obs.industry).await {
                Ok(found) => {
                    let kind = found.map(|m| m.kind);
                    catalog.insert(key, kind);
                    kind
                }
                Err(e) => {
                    warn!("Row {row_number}: metric lookup failed: {e}");
                    summary.record_skipped(row_number, SkipReason::Unknown);
                    continue;
                }
            },
        };

        // 3. Only manual metrics accept uploaded data
        match kind {
            None => summary.record_skipped(row_number, SkipReason::MetricNotFound),
            Some(MetricKind::Live) => summary.record_skipped(row_number, SkipReason::LiveMetric),
            Some(MetricKind::Manual) => match db::insert_observation(pool, &obs).await {
                Ok(_) => summary.record_inserted(),
                Err(e) if db::is_unique_violation(&e) => {
                    summary.record_skipped(row_number, SkipReason::Duplicate)
                }
                Err(e) => {
                    warn!("Row {row_number}: insert failed: {e}");
                    summary.record_skipped(row_number, SkipReason::Unknown);
                }
            },
        }
    }

    info!(
        "CSV import finished: processed={} inserted={} skipped={}",
        summary.processed, summary.inserted, summary.skipped
    );
    summary
}

/// Imports an uploaded file. The file is deleted once parsing completes,
/// whether parsing succeeded or not, and before any row is inserted.
pub async fn import_upload(pool: &SqlitePool, upload: NamedTempFile) -> Result<ImportSummary, ImportError> {
    let path = upload.path().to_path_buf();
    let parsed = tokio::task::spawn_blocking(move || read_rows_from_path(&path)).await;

    if let Err(e) = upload.close() {
        warn!("Failed to remove uploaded file: {e}");
    }

    let rows = parsed??;
    Ok(import_rows(pool, &rows).await)
}
