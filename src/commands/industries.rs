use std::sync::Arc;

use axum::extract::State;

use super::ApiResult;
use crate::db;
use crate::models::{ApiResponse, Industry};
use crate::state::AppState;

pub async fn fetch_industries(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Industry>> {
    let industries = db::list_industries(&state.pool).await?;
    Ok(ApiResponse::ok(200, industries, "Industries fetched successfully"))
}
