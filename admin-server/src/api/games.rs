//! Game catalog endpoints

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use shared::error::ApiResponse;
use shared::models::{Game, GameCreate, GameUpdate};

use super::ApiResult;
use crate::db::games;
use crate::state::AppState;
use crate::validation::{MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, validate_required_text, validate_url};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/games", get(list).post(create))
        .route("/api/games/{id}", get(get_by_id).put(update).delete(delete))
}

pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<Game>> {
    Ok(ApiResponse::success(games::list(&state.pool).await?))
}

pub async fn get_by_id(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Game> {
    Ok(ApiResponse::success(games::get(&state.pool, id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(req): Json<GameCreate>,
) -> ApiResult<Game> {
    validate_required_text(&req.title, "title", MAX_NAME_LEN)?;
    validate_required_text(&req.category, "category", MAX_SHORT_TEXT_LEN)?;
    validate_url(&req.image, "image")?;
    Ok(ApiResponse::success(games::create(&state.pool, req).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<GameUpdate>,
) -> ApiResult<Game> {
    if let Some(ref title) = req.title {
        validate_required_text(title, "title", MAX_NAME_LEN)?;
    }
    if let Some(ref category) = req.category {
        validate_required_text(category, "category", MAX_SHORT_TEXT_LEN)?;
    }
    if let Some(ref image) = req.image {
        validate_url(image, "image")?;
    }
    Ok(ApiResponse::success(games::update(&state.pool, id, req).await?))
}

/// Links from categories and services go with the game.
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<()> {
    games::delete(&state.pool, id).await?;
    Ok(ApiResponse::ok())
}
