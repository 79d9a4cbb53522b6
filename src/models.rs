use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use chrono::{DateTime, Utc};
use std::fmt;

/// Where a metric's observations come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MetricKind {
    /// Fetched on demand from the World Bank API
    Live,
    /// Entered by admins or imported from CSV
    Manual,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricKind::Live => write!(f, "live"),
            MetricKind::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MetricStatus {
    Active,
    Inactive,
}

impl MetricStatus {
    pub fn from_active(active: bool) -> Self {
        if active { MetricStatus::Active } else { MetricStatus::Inactive }
    }

    pub fn is_active(self) -> bool {
        self == MetricStatus::Active
    }
}

/// Catalog entry. `(name, industry)` identifies the metric; an empty industry
/// marks a general (macro) metric.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub industry: String,
    pub unit: String,
    pub source: String,
    pub status: MetricStatus,
    pub kind: MetricKind,
    pub indicator_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMetric {
    pub name: String,
    pub description: String,
    pub industry: String,
    pub unit: String,
    pub source: String,
    pub kind: MetricKind,
    pub indicator_code: Option<String>,
}

/// Editable metric fields. Identity (`name`, `industry`) is deliberately absent.
#[derive(Debug, Clone, Default)]
pub struct MetricChanges {
    pub description: Option<String>,
    pub unit: Option<String>,
    pub source: Option<String>,
    pub kind: Option<MetricKind>,
    pub indicator_code: Option<Option<String>>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Industry {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One stored data point of a manual metric.
#[derive(Debug, Serialize, Deserialize, FromRow, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    pub id: i64,
    pub metric_name: String,
    pub industry: String,
    pub country: String,
    pub year: i32,
    pub value: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub metric_name: String,
    pub industry: String,
    pub country: String,
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, FromRow)]
pub struct YearValue {
    pub year: i32,
    pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Country {
    pub code: String,
    pub name: String,
}

/// Series payload shared by the live and manual explorer endpoints.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SeriesResponse {
    pub data: Vec<YearValue>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub countries: Option<Vec<Country>>,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total: i64) -> Self {
        let total_pages = (total + per_page - 1) / per_page;
        Self {
            data,
            page,
            total_pages,
            total,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardInfo {
    pub macro_metrics: i64,
    pub industry_metrics: i64,
    pub live_metrics: i64,
    pub manual_metrics: i64,
    pub total_metric_data: i64,
    pub total_industries: i64,
}

/// Why a CSV row was not inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    #[serde(rename = "Missing or invalid fields")]
    InvalidFields,
    #[serde(rename = "Metric not found")]
    MetricNotFound,
    #[serde(rename = "Cannot upload data for live metric")]
    LiveMetric,
    #[serde(rename = "Duplicate entry")]
    Duplicate,
    #[serde(rename = "Unknown error")]
    Unknown,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SkipReason::InvalidFields => "Missing or invalid fields",
            SkipReason::MetricNotFound => "Metric not found",
            SkipReason::LiveMetric => "Cannot upload data for live metric",
            SkipReason::Duplicate => "Duplicate entry",
            SkipReason::Unknown => "Unknown error",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based, header excluded
    pub row: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

impl ImportSummary {
    pub fn record_inserted(&mut self) {
        self.processed += 1;
        self.inserted += 1;
    }

    pub fn record_skipped(&mut self, row: usize, reason: SkipReason) {
        self.processed += 1;
        self.skipped += 1;
        self.errors.push(RowError { row, reason });
    }
}

/// Response envelope used by every HTTP endpoint, success or failure.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(status_code: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: status_code < 400,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            success: false,
            message: message.into(),
            data: None,
        }
    }
}
