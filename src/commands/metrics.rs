use std::sync::Arc;

use axum::extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State};
use serde::Deserialize;

use super::{non_blank, ApiResult};
use crate::db;
use crate::error::AppError;
use crate::models::{ApiResponse, MetricDefinition};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IndustryQuery {
    pub industry: Option<String>,
}

/// Metrics of one industry, or the general (macro) metrics when no industry is given.
pub async fn fetch_metrics(
    State(state): State<Arc<AppState>>,
    query: Result<Query<IndustryQuery>, QueryRejection>,
) -> ApiResult<Vec<MetricDefinition>> {
    let Query(query) = query?;
    let industry = non_blank(query.industry.as_deref()).unwrap_or_default();

    let metrics = db::list_metrics_for_industry(&state.pool, industry).await?;

    let message = match (industry.is_empty(), metrics.is_empty()) {
        (true, true) => "No general metrics found".to_string(),
        (true, false) => "General metrics fetched successfully".to_string(),
        (false, true) => format!("No metrics found for industry: {industry}"),
        (false, false) => format!("Metrics fetched successfully for industry: {industry}"),
    };
    Ok(ApiResponse::ok(200, metrics, message))
}

pub async fn get_metric(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<MetricDefinition> {
    let Path(id) = id?;

    let metric = db::get_metric(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Metric not found.".to_string()))?;

    if !metric.status.is_active() {
        return Err(AppError::Inactive("Metric is inactive.".to_string()));
    }

    Ok(ApiResponse::ok(200, metric, "Metric details fetched successfully."))
}
