//! Category endpoints, including the per-category service order

use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use shared::error::ApiResponse;
use shared::models::{Category, CategoryCreate, CategoryUpdate};

use super::{ApiResult, ReorderRequest};
use crate::auth::AdminIdentity;
use crate::db::catalog::{Outcome, Removed, category, service};
use crate::db::ordering::engine::ScopeChange;
use crate::state::AppState;
use crate::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_required_text,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/categories", get(list).post(create))
        .route("/api/categories/order", put(reorder))
        .route(
            "/api/categories/{id}",
            get(get_by_id).put(update).delete(delete),
        )
        .route("/api/categories/{id}/services/order", put(reorder_services))
}

/// GET /api/categories
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Category>> {
    Ok(ApiResponse::success(category::list(&state.pool).await?))
}

/// GET /api/categories/{id}
pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Category> {
    Ok(ApiResponse::success(category::get(&state.pool, id).await?))
}

/// POST /api/categories
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<CategoryCreate>,
) -> ApiResult<Outcome<Category>> {
    validate_required_text(&req.name, "name", MAX_NAME_LEN)?;
    validate_required_text(&req.description, "description", MAX_NOTE_LEN)?;
    validate_required_text(&req.icon, "icon", MAX_SHORT_TEXT_LEN)?;
    Ok(ApiResponse::success(category::create(&state.ordering, req).await?))
}

/// PUT /api/categories/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CategoryUpdate>,
) -> ApiResult<Outcome<Category>> {
    if let Some(ref name) = req.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
    }
    if let Some(ref description) = req.description {
        validate_required_text(description, "description", MAX_NOTE_LEN)?;
    }
    if let Some(ref icon) = req.icon {
        validate_required_text(icon, "icon", MAX_SHORT_TEXT_LEN)?;
    }
    Ok(ApiResponse::success(category::update(&state.ordering, id, req).await?))
}

/// DELETE /api/categories/{id}
///
/// Removes the category's services too.
pub async fn delete(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(id): Path<i64>,
) -> ApiResult<Removed> {
    tracing::info!(user = %identity.user_id, id, "Category delete requested");
    Ok(ApiResponse::success(category::delete(&state.ordering, id).await?))
}

/// PUT /api/categories/order
pub async fn reorder(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<ScopeChange> {
    tracing::info!(user = %identity.user_id, count = req.ids.len(), "Category reorder requested");
    Ok(ApiResponse::success(category::reorder(&state.ordering, &req.ids).await?))
}

/// PUT /api/categories/{id}/services/order
pub async fn reorder_services(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Path(id): Path<i64>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<ScopeChange> {
    tracing::info!(
        user = %identity.user_id,
        category_id = id,
        count = req.ids.len(),
        "Service reorder requested"
    );
    Ok(ApiResponse::success(service::reorder(&state.ordering, id, &req.ids).await?))
}
