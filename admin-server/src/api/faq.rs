//! FAQ item endpoints

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use shared::error::ApiResponse;
use shared::models::{FaqItem, FaqItemCreate, FaqItemUpdate};

use super::{ApiResult, ReorderRequest};
use crate::auth::AdminIdentity;
use crate::db::catalog::{Outcome, Removed, faq};
use crate::db::ordering::engine::ScopeChange;
use crate::state::AppState;
use crate::validation::{MAX_CONTENT_LEN, MAX_NAME_LEN, validate_required_text};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/faq", get(list).post(create))
        .route("/api/faq/order", put(reorder))
        .route("/api/faq/{id}", get(get_by_id).put(update).delete(delete))
}

/// GET /api/faq
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<FaqItem>> {
    Ok(ApiResponse::success(faq::list(&state.pool).await?))
}

/// GET /api/faq/{id}
pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<FaqItem> {
    Ok(ApiResponse::success(faq::get(&state.pool, id).await?))
}

/// POST /api/faq
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<FaqItemCreate>,
) -> ApiResult<Outcome<FaqItem>> {
    validate_required_text(&req.title, "title", MAX_NAME_LEN)?;
    validate_required_text(&req.content, "content", MAX_CONTENT_LEN)?;
    Ok(ApiResponse::success(faq::create(&state.ordering, req).await?))
}

/// PUT /api/faq/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<FaqItemUpdate>,
) -> ApiResult<Outcome<FaqItem>> {
    if let Some(ref title) = req.title {
        validate_required_text(title, "title", MAX_NAME_LEN)?;
    }
    if let Some(ref content) = req.content {
        validate_required_text(content, "content", MAX_CONTENT_LEN)?;
    }
    Ok(ApiResponse::success(faq::update(&state.ordering, id, req).await?))
}

/// DELETE /api/faq/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Removed> {
    Ok(ApiResponse::success(faq::delete(&state.ordering, id).await?))
}

/// PUT /api/faq/order
pub async fn reorder(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<ScopeChange> {
    tracing::info!(user = %identity.user_id, count = req.ids.len(), "FAQ reorder requested");
    Ok(ApiResponse::success(faq::reorder(&state.ordering, &req.ids).await?))
}
