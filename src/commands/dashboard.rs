use std::sync::Arc;

use axum::extract::State;

use super::ApiResult;
use crate::db;
use crate::models::{ApiResponse, DashboardInfo};
use crate::state::AppState;

pub async fn dashboard_info(State(state): State<Arc<AppState>>) -> ApiResult<DashboardInfo> {
    let info = db::dashboard_info(&state.pool).await?;
    Ok(ApiResponse::ok(200, info, "Dashboard info fetched successfully."))
}
