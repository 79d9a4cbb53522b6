use std::sync::Arc;

use axum::extract::{rejection::JsonRejection, rejection::PathRejection, Path, State};
use axum::Json;
use serde::Deserialize;

use super::{non_blank, ApiResult};
use crate::db;
use crate::error::AppError;
use crate::models::{ApiResponse, Industry};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddIndustryBody {
    pub name: Option<String>,
}

pub async fn add_industry(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AddIndustryBody>, JsonRejection>,
) -> ApiResult<Industry> {
    let Json(body) = payload?;
    let name = non_blank(body.name.as_deref())
        .ok_or_else(|| AppError::BadRequest("Industry name is required".to_string()))?;

    let industry = db::insert_industry(&state.pool, name).await.map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("Industry with this name already exists".to_string())
        } else {
            e.into()
        }
    })?;

    Ok(ApiResponse::ok(201, industry, "Industry created successfully"))
}

pub async fn fetch_all_industries(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Industry>> {
    let industries = db::list_industries(&state.pool).await?;
    Ok(ApiResponse::ok(200, industries, "All industries fetched successfully!"))
}

pub async fn delete_industry(
    State(state): State<Arc<AppState>>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Industry> {
    let Path(id) = id?;

    let deleted = db::delete_industry(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Industry not found".to_string()))?;

    let message = format!("Industry '{}' deleted successfully!", deleted.name);
    Ok(ApiResponse::ok(200, deleted, message))
}
