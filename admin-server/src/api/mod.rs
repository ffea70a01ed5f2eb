//! HTTP API for the storefront admin
//!
//! Everything under `/api` requires an admin token; `/health` is public.
//! Responses use the shared [`ApiResponse`] envelope.

pub mod categories;
pub mod faq;
pub mod games;
pub mod health;
pub mod ordering;
pub mod policies;
pub mod services;
pub mod site_config;

use axum::routing::get;
use axum::{Router, middleware};
use http::HeaderValue;
use http::header::InvalidHeaderValue;
use serde::Deserialize;
use shared::error::{ApiResponse, AppError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::admin_auth_middleware;
use crate::config::Config;
use crate::state::AppState;

pub type ApiResult<T> = Result<ApiResponse<T>, AppError>;

/// Body of the bulk reorder endpoints: every id of the scope, in the new order
#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<i64>,
}

fn cors_layer(config: &Config) -> Result<CorsLayer, InvalidHeaderValue> {
    match config.cors_allowed_origin {
        Some(ref origin) => Ok(CorsLayer::new()
            .allow_origin(origin.parse::<HeaderValue>()?)
            .allow_methods(Any)
            .allow_headers(Any)),
        None => Ok(CorsLayer::permissive()),
    }
}

/// Create the combined router
pub fn create_router(state: AppState, config: &Config) -> Result<Router, InvalidHeaderValue> {
    let admin = Router::new()
        .merge(faq::router())
        .merge(categories::router())
        .merge(services::router())
        .merge(games::router())
        .merge(site_config::router())
        .merge(policies::router())
        .merge(ordering::router())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ));

    Ok(Router::new()
        .route("/health", get(health::health_check))
        .merge(admin)
        .layer(cors_layer(config)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
