//! Service endpoints
//!
//! Ordering is per category; see `PUT /api/categories/{id}/services/order`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use shared::error::{ApiResponse, AppError};
use shared::models::{PriceComponentInput, Service, ServiceCreate, ServiceUpdate};

use super::ApiResult;
use crate::db::catalog::{Outcome, Removed, service};
use crate::state::AppState;
use crate::validation::{
    MAX_LIST_ITEMS, MAX_NAME_LEN, MAX_NOTE_LEN, validate_price, validate_required_text,
    validate_text_list, validate_url,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/services", get(list).post(create))
        .route(
            "/api/services/{id}",
            get(get_by_id).put(update).delete(delete),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category_id: Option<i64>,
}

fn validate_components(components: &[PriceComponentInput]) -> Result<(), AppError> {
    if components.len() > MAX_LIST_ITEMS {
        return Err(AppError::invalid_field(
            "price_components",
            format!("price_components has too many entries (max {MAX_LIST_ITEMS})"),
        ));
    }
    components.iter().try_for_each(PriceComponentInput::validate)
}

/// GET /api/services?category_id=
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<Service>> {
    Ok(ApiResponse::success(
        service::list(&state.pool, query.category_id).await?,
    ))
}

/// GET /api/services/{id}
pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Service> {
    Ok(ApiResponse::success(service::get(&state.pool, id).await?))
}

/// POST /api/services
pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<ServiceCreate>,
) -> ApiResult<Outcome<Service>> {
    validate_required_text(&req.title, "title", MAX_NAME_LEN)?;
    validate_price(req.price, "price")?;
    validate_url(&req.image, "image")?;
    validate_text_list(&req.description, "description", MAX_NOTE_LEN)?;
    validate_components(&req.price_components)?;
    Ok(ApiResponse::success(service::create(&state.ordering, req).await?))
}

/// PUT /api/services/{id}
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<ServiceUpdate>,
) -> ApiResult<Outcome<Service>> {
    if let Some(ref title) = req.title {
        validate_required_text(title, "title", MAX_NAME_LEN)?;
    }
    if let Some(price) = req.price {
        validate_price(price, "price")?;
    }
    if let Some(ref image) = req.image {
        validate_url(image, "image")?;
    }
    if let Some(ref description) = req.description {
        validate_text_list(description, "description", MAX_NOTE_LEN)?;
    }
    if let Some(ref components) = req.price_components {
        validate_components(components)?;
    }
    Ok(ApiResponse::success(service::update(&state.ordering, id, req).await?))
}

/// DELETE /api/services/{id}
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Removed> {
    Ok(ApiResponse::success(service::delete(&state.ordering, id).await?))
}
