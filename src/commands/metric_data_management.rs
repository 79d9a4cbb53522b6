use std::io::Write;
use std::sync::Arc;

use axum::extract::multipart::MultipartRejection;
use axum::extract::{rejection::JsonRejection, rejection::QueryRejection, Multipart, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{non_blank, ApiResult};
use crate::analysis::key_figures::Numeric;
use crate::core::importer::{self, ImportError};
use crate::db::{self, ObservationFilter};
use crate::error::AppError;
use crate::models::{ApiResponse, ImportSummary, MetricDefinition, Observation, Page};
use crate::state::AppState;

pub const PAGE_SIZE: i64 = 20;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricIdQuery {
    pub metric_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSelectedBody {
    pub metric_id: Option<i64>,
    pub country: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditValueBody {
    pub metric_data_id: Option<i64>,
    pub value: Option<Numeric>,
}

#[derive(Debug, Serialize)]
pub struct ManualMetricData {
    pub data: Vec<Observation>,
    pub countries: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedCount {
    pub deleted_count: u64,
}

fn manual_metric_not_found() -> AppError {
    AppError::NotFound("Manual metric not found.".to_string())
}

async fn require_manual_metric(state: &AppState, id: Option<i64>) -> Result<MetricDefinition, AppError> {
    let id = id.ok_or_else(|| AppError::BadRequest("Metric ID is required.".to_string()))?;
    db::get_manual_metric(&state.pool, id)
        .await?
        .ok_or_else(manual_metric_not_found)
}

/// Multipart CSV upload (field `file`). The file is spooled to the upload
/// directory, imported row by row and removed again.
pub async fn upload_data(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ImportSummary> {
    let mut multipart = multipart?;
    let limit = state.config.max_upload_bytes;
    let mut upload = None;

    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }

        // 1. Transport checks before anything touches the disk
        let file_name = field.file_name().unwrap_or_default().to_string();
        importer::validate_upload(&file_name, field.content_type())?;

        // 2. Spool to a temp file (removed on drop if we bail out early)
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".csv")
            .tempfile_in(&state.config.upload_dir)
            .map_err(ImportError::from)?;

        let mut size = 0usize;
        while let Some(chunk) = field.chunk().await? {
            size += chunk.len();
            if size > limit {
                return Err(AppError::PayloadTooLarge(format!(
                    "Uploaded file exceeds the {limit} byte limit."
                )));
            }
            file.write_all(&chunk).map_err(ImportError::from)?;
        }
        file.flush().map_err(ImportError::from)?;

        upload = Some((file_name, size, file));
        break;
    }

    let Some((file_name, size, file)) = upload else {
        return Err(AppError::BadRequest("No file uploaded.".to_string()));
    };

    info!("Importing uploaded CSV '{file_name}' ({size} bytes)");
    let summary = importer::import_upload(&state.pool, file).await?;

    Ok(ApiResponse::ok(200, summary, "CSV upload processed."))
}

/// Every stored observation, newest first, `PAGE_SIZE` per page.
pub async fn all_metric_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Page<Observation>> {
    let Query(query) = query?;
    let page = query
        .page
        .as_deref()
        .and_then(|p| p.trim().parse::<i64>().ok())
        .filter(|p| *p >= 1)
        .unwrap_or(1);

    let total = db::count_observations(&state.pool).await?;
    let offset = (page - 1).saturating_mul(PAGE_SIZE);
    let data = db::list_observations_page(&state.pool, PAGE_SIZE, offset).await?;

    Ok(ApiResponse::ok(
        200,
        Page::new(data, page, PAGE_SIZE, total),
        "All metric data fetched.",
    ))
}

pub async fn get_manual_metrics(State(state): State<Arc<AppState>>) -> ApiResult<Vec<MetricDefinition>> {
    let metrics = db::list_manual_metrics(&state.pool).await?;
    Ok(ApiResponse::ok(200, metrics, "All manual metrics fetched."))
}

/// Observations of one manual metric (country ascending, newest year first) and its countries.
pub async fn get_manual_metric_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MetricIdQuery>, QueryRejection>,
) -> ApiResult<ManualMetricData> {
    let Query(query) = query?;
    let id = non_blank(query.metric_id.as_deref()).and_then(|id| id.parse::<i64>().ok());
    let metric = require_manual_metric(&state, id).await?;

    let filter = ObservationFilter {
        metric_name: &metric.name,
        industry: &metric.industry,
        ..ObservationFilter::default()
    };
    let mut data = db::find_observations(&state.pool, &filter).await?;
    data.sort_by(|a, b| a.country.cmp(&b.country).then(b.year.cmp(&a.year)));

    let countries = db::distinct_countries(&state.pool, &metric.name, &metric.industry).await?;

    Ok(ApiResponse::ok(
        200,
        ManualMetricData { data, countries },
        "Metric data for selected manual metric fetched.",
    ))
}

/// Deletes a manual metric's observations, optionally for one country only.
pub async fn delete_selected_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DeleteSelectedBody>, JsonRejection>,
) -> ApiResult<DeletedCount> {
    let Json(body) = payload?;
    let metric = require_manual_metric(&state, body.metric_id).await?;
    let country = non_blank(body.country.as_deref());

    let deleted_count = db::delete_observations(&state.pool, &metric.name, &metric.industry, country).await?;

    let scope = match country {
        Some(country) => format!("metric '{}' and country {country}", metric.name),
        None => format!("metric '{}'", metric.name),
    };
    if deleted_count == 0 {
        return Err(AppError::NotFound(format!("No metric data found to delete for {scope}.")));
    }

    info!("Deleted {deleted_count} observations for {scope}");
    Ok(ApiResponse::ok(
        200,
        DeletedCount { deleted_count },
        format!("Metric data deleted for {scope}."),
    ))
}

pub async fn edit_metric_data_value(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EditValueBody>, JsonRejection>,
) -> ApiResult<Observation> {
    let Json(body) = payload?;

    let id = body
        .metric_data_id
        .ok_or_else(|| AppError::BadRequest("MetricData ID is required.".to_string()))?;
    let value = body
        .value
        .as_ref()
        .and_then(Numeric::as_f64)
        .ok_or_else(|| AppError::BadRequest("A valid value is required.".to_string()))?;

    let updated = db::update_observation_value(&state.pool, id, value)
        .await?
        .ok_or_else(|| AppError::NotFound("MetricData document not found.".to_string()))?;

    Ok(ApiResponse::ok(200, updated, "MetricData value updated successfully."))
}
