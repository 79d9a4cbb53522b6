use std::sync::Arc;

use axum::extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::warn;

use super::{non_blank, parse_year, ApiResult};
use crate::analysis::{calculate_key_figures, KeyFigures, KeyFiguresRequest};
use crate::core::timeseries::{filter_years, year_bounds};
use crate::db::{self, ObservationFilter};
use crate::error::AppError;
use crate::models::{ApiResponse, Country, SeriesResponse, YearValue};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveDataQuery {
    pub country_code: Option<String>,
    pub indicator_code: Option<String>,
    pub start_year: Option<String>,
    pub end_year: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualDataQuery {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub start_year: Option<String>,
    pub end_year: Option<String>,
}

/// Series of a live metric straight from the World Bank, plus the country picker list.
pub async fn fetch_live_metric_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<LiveDataQuery>, QueryRejection>,
) -> ApiResult<SeriesResponse> {
    let Query(query) = query?;

    let (Some(country_code), Some(indicator_code)) = (
        non_blank(query.country_code.as_deref()),
        non_blank(query.indicator_code.as_deref()),
    ) else {
        return Err(AppError::BadRequest("countryCode and indicatorCode are required.".to_string()));
    };
    let start_year = parse_year("startYear", query.start_year.as_deref())?;
    let end_year = parse_year("endYear", query.end_year.as_deref())?;

    // 1. Full series (year bounds describe the whole series, not the window)
    let points = state
        .live_source
        .fetch_series(country_code, indicator_code)
        .await
        .map_err(|e| {
            warn!("Live fetch from {} failed: {e:#}", state.live_source.name());
            AppError::Upstream("Failed to fetch data from World Bank API.".to_string())
        })?;
    let bounds = year_bounds(points.iter().map(|p| p.year));

    // 2. Window
    let data = filter_years(points, start_year, end_year);

    // 3. Country list is best effort
    let countries = match state.live_source.fetch_countries().await {
        Ok(countries) => Some(countries),
        Err(e) => {
            warn!("Country list fetch failed: {e:#}");
            None
        }
    };

    let response = SeriesResponse {
        data,
        min_year: bounds.map(|(lo, _)| lo),
        max_year: bounds.map(|(_, hi)| hi),
        countries,
    };
    Ok(ApiResponse::ok(200, response, "World Bank data fetched successfully."))
}

/// Stored series of a manual metric for one country.
pub async fn fetch_manual_metric_data(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ManualDataQuery>, QueryRejection>,
) -> ApiResult<SeriesResponse> {
    let Query(query) = query?;

    let name = non_blank(query.name.as_deref())
        .ok_or_else(|| AppError::BadRequest("name is required.".to_string()))?;
    let industry = non_blank(query.industry.as_deref()).unwrap_or_default();
    let country = non_blank(query.country.as_deref()).unwrap_or(state.config.default_country.as_str());
    let from_year = parse_year("startYear", query.start_year.as_deref())?;
    let to_year = parse_year("endYear", query.end_year.as_deref())?;

    db::find_metric_by_name(&state.pool, name, industry)
        .await?
        .ok_or_else(|| AppError::NotFound("Metric not found for the given name and industry.".to_string()))?;

    let filter = ObservationFilter {
        metric_name: name,
        industry,
        country: Some(country),
        from_year,
        to_year,
    };
    let data: Vec<YearValue> = db::find_observations(&state.pool, &filter)
        .await?
        .into_iter()
        .map(|obs| YearValue { year: obs.year, value: obs.value })
        .collect();

    let bounds = year_bounds(data.iter().map(|p| p.year));
    let countries = if data.is_empty() {
        None
    } else {
        let names = db::distinct_countries(&state.pool, name, industry).await?;
        Some(
            names
                .into_iter()
                .map(|c| Country { code: c.clone(), name: c })
                .collect(),
        )
    };

    let response = SeriesResponse {
        data,
        min_year: bounds.map(|(lo, _)| lo),
        max_year: bounds.map(|(_, hi)| hi),
        countries,
    };
    Ok(ApiResponse::ok(200, response, "Manual metric data fetched successfully."))
}

pub async fn key_figures(payload: Result<Json<KeyFiguresRequest>, JsonRejection>) -> ApiResult<KeyFigures> {
    let Json(request) = payload?;
    let figures = calculate_key_figures(&request.series, request.from_year, request.to_year);
    Ok(ApiResponse::ok(200, figures, "Key figures calculated successfully."))
}
