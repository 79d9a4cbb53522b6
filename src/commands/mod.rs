use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::AppError;
use crate::models::ApiResponse;
use crate::state::AppState;

pub mod dashboard;
pub mod industries;
pub mod industry_management;
pub mod metric_data;
pub mod metric_data_management;
pub mod metric_management;
pub mod metrics;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Room for multipart boundaries and part headers on top of the file ceiling.
/// The file itself is held to `max_upload_bytes` by the upload handler.
pub const MULTIPART_OVERHEAD_BYTES: usize = 16 * 1024;

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::OK);
        (status, Json(self)).into_response()
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let upload_limit =
        DefaultBodyLimit::max(state.config.max_upload_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES));
    let json_limit = DefaultBodyLimit::max(state.config.json_body_limit);

    let api = Router::new()
        // Explorer
        .route("/metrics/fetch-metrics", get(metrics::fetch_metrics))
        .route("/metrics/get-metric/{id}", get(metrics::get_metric))
        .route("/industries/fetch-industries", get(industries::fetch_industries))
        .route("/metric-data/fetch-live-metric-data", get(metric_data::fetch_live_metric_data))
        .route("/metric-data/fetch-manual-metric-data", get(metric_data::fetch_manual_metric_data))
        .route("/metric-data/key-figures", post(metric_data::key_figures))
        // Admin
        .route("/metric-management/add", post(metric_management::add_metric))
        .route("/metric-management/fetch-all-metrics", get(metric_management::fetch_all_metrics))
        .route("/metric-management/edit/{id}", patch(metric_management::edit_metric))
        .route("/metric-management/update-status/{id}", patch(metric_management::update_status))
        .route("/metric-management/delete/{id}", delete(metric_management::delete_metric))
        .route("/industry-management/add", post(industry_management::add_industry))
        .route(
            "/industry-management/fetch-all-industries",
            get(industry_management::fetch_all_industries),
        )
        .route("/industry-management/delete/{id}", delete(industry_management::delete_industry))
        .route(
            "/metric-data-management/upload-data",
            post(metric_data_management::upload_data).layer(upload_limit),
        )
        .route("/metric-data-management/all-metric-data", get(metric_data_management::all_metric_data))
        .route(
            "/metric-data-management/get-manual-metrics",
            get(metric_data_management::get_manual_metrics),
        )
        .route(
            "/metric-data-management/get-manual-metric-data",
            get(metric_data_management::get_manual_metric_data),
        )
        .route(
            "/metric-data-management/delete-selected-data",
            delete(metric_data_management::delete_selected_data),
        )
        .route(
            "/metric-data-management/edit-metric-data-value",
            patch(metric_data_management::edit_metric_data_value),
        )
        .route("/dashboard", get(dashboard::dashboard_info));

    Router::new()
        .nest("/api/v1", api)
        .fallback(route_not_found)
        .layer(json_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn route_not_found() -> AppError {
    AppError::NotFound("Route not found.".to_string())
}

/// Parses an optional year query parameter. Blank counts as absent.
pub(crate) fn parse_year(name: &str, raw: Option<&str>) -> Result<Option<i32>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => s
            .parse::<i32>()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("{name} must be a whole year."))),
    }
}

/// Trimmed, non-empty query or body text.
pub(crate) fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}
