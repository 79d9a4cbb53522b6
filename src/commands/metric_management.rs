use std::sync::Arc;

use axum::extract::{rejection::JsonRejection, rejection::PathRejection, Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use super::{non_blank, ApiResult};
use crate::db;
use crate::error::AppError;
use crate::models::{ApiResponse, MetricChanges, MetricDefinition, MetricKind, MetricStatus, NewMetric};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddMetricBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub industry: Option<String>,
    pub unit: Option<String>,
    pub source: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<String>,
    pub indicator_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMetricBody {
    pub description: Option<String>,
    pub unit: Option<String>,
    pub source: Option<String>,
    #[serde(alias = "type")]
    pub kind: Option<String>,
    pub indicator_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: Option<bool>,
}

fn parse_kind(raw: &str) -> Result<MetricKind, AppError> {
    match raw.trim() {
        "live" => Ok(MetricKind::Live),
        "manual" => Ok(MetricKind::Manual),
        _ => Err(AppError::BadRequest("Type must be either 'live' or 'manual'".to_string())),
    }
}

fn metric_not_found() -> AppError {
    AppError::NotFound("Metric not found".to_string())
}

pub async fn add_metric(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddMetricBody>, JsonRejection>,
) -> ApiResult<MetricDefinition> {
    let Json(body) = payload?;

    let name = non_blank(body.name.as_deref())
        .ok_or_else(|| AppError::BadRequest("Metric name is required".to_string()))?;
    let industry = non_blank(body.industry.as_deref()).unwrap_or_default();
    let kind = match non_blank(body.kind.as_deref()) {
        Some(raw) => parse_kind(raw)?,
        None => MetricKind::Manual,
    };

    // Manual metrics never carry an indicator code
    let indicator_code = match kind {
        MetricKind::Manual => None,
        MetricKind::Live => Some(
            non_blank(body.indicator_code.as_deref())
                .ok_or_else(|| AppError::BadRequest("Indicator code is required for live metrics".to_string()))?
                .to_string(),
        ),
    };

    let conflict = || {
        if industry.is_empty() {
            AppError::Conflict(format!("General metric '{name}' already exists"))
        } else {
            AppError::Conflict(format!("Metric '{name}' already exists for industry '{industry}'"))
        }
    };

    let new_metric = NewMetric {
        name: name.to_string(),
        description: body.description.unwrap_or_default(),
        industry: industry.to_string(),
        unit: body.unit.unwrap_or_default(),
        source: body.source.unwrap_or_default(),
        kind,
        indicator_code,
    };

    let metric = match db::insert_metric(&state.pool, &new_metric).await {
        Ok(metric) => metric,
        Err(e) if db::is_unique_violation(&e) => return Err(conflict()),
        Err(e) => return Err(e.into()),
    };

    info!("Created {kind} metric '{name}' (industry '{industry}')");

    let message = if industry.is_empty() {
        format!("General metric '{name}' created successfully")
    } else {
        format!("Metric '{name}' created successfully for industry '{industry}'")
    };
    Ok(ApiResponse::ok(201, metric, message))
}

pub async fn fetch_all_metrics(State(state): State<Arc<AppState>>) -> ApiResult<Vec<MetricDefinition>> {
    let metrics = db::list_all_metrics(&state.pool).await?;
    Ok(ApiResponse::ok(200, metrics, "All metrics fetched successfully!"))
}

/// Edits descriptive fields and the kind. `(name, industry)` cannot change.
pub async fn edit_metric(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<EditMetricBody>, JsonRejection>,
) -> ApiResult<MetricDefinition> {
    let Path(id) = id?;
    let Json(body) = payload?;

    let requested_kind = non_blank(body.kind.as_deref()).map(parse_kind).transpose()?;
    let current = db::get_metric(&state.pool, id).await?.ok_or_else(metric_not_found)?;

    let indicator_code = match requested_kind.unwrap_or(current.kind) {
        MetricKind::Manual => None,
        MetricKind::Live => Some(
            non_blank(body.indicator_code.as_deref())
                .map(str::to_string)
                .or(current.indicator_code)
                .ok_or_else(|| {
                    AppError::BadRequest("Indicator code is required when changing type to 'live'".to_string())
                })?,
        ),
    };

    let changes = MetricChanges {
        description: body.description,
        unit: body.unit,
        source: body.source,
        kind: requested_kind,
        indicator_code: Some(indicator_code),
    };

    let updated = db::update_metric(&state.pool, id, &changes)
        .await?
        .ok_or_else(metric_not_found)?;

    let message = format!("Metric '{}' updated successfully!", updated.name);
    Ok(ApiResponse::ok(200, updated, message))
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<StatusBody>, JsonRejection>,
) -> ApiResult<MetricDefinition> {
    let Path(id) = id?;
    let Json(body) = payload?;

    let active = body
        .status
        .ok_or_else(|| AppError::BadRequest("Status must be a boolean".to_string()))?;

    let updated = db::set_metric_status(&state.pool, id, MetricStatus::from_active(active))
        .await?
        .ok_or_else(metric_not_found)?;

    let message = format!(
        "Metric status updated to {} successfully!",
        if active { "active" } else { "inactive" }
    );
    Ok(ApiResponse::ok(200, updated, message))
}

/// Removes the catalog entry only; stored observations stay.
pub async fn delete_metric(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MetricDefinition> {
    let Path(id) = id?;

    let deleted = db::delete_metric(&state.pool, id).await?.ok_or_else(metric_not_found)?;

    info!("Deleted metric '{}' (industry '{}')", deleted.name, deleted.industry);
    let message = format!("Metric '{}' deleted successfully!", deleted.name);
    Ok(ApiResponse::ok(200, deleted, message))
}
