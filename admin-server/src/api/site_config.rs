//! Site configuration endpoints

use axum::{Json, Router, extract::State, routing::get};
use shared::error::{ApiResponse, AppError};
use shared::models::{SiteConfig, SiteConfigUpdate};

use super::ApiResult;
use crate::db::site_content;
use crate::state::AppState;
use crate::validation::{
    MAX_CONTENT_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, validate_optional_text, validate_required_text,
    validate_text_list, validate_url,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/site-config", get(get_config).put(save_config))
}

/// GET /api/site-config
///
/// Defaults until the first save.
pub async fn get_config(State(state): State<AppState>) -> ApiResult<SiteConfig> {
    let config = site_content::get_site_config(&state.pool)
        .await?
        .unwrap_or_default();
    Ok(ApiResponse::success(config))
}

fn validate(req: &SiteConfigUpdate) -> Result<(), AppError> {
    validate_required_text(&req.logo_text, "logo_text", MAX_NAME_LEN)?;
    validate_required_text(&req.home_title, "home_title", MAX_NAME_LEN)?;
    validate_required_text(&req.home_subtitle, "home_subtitle", MAX_NOTE_LEN)?;
    validate_required_text(&req.accordion_title, "accordion_title", MAX_NAME_LEN)?;
    validate_required_text(
        &req.footer_payment_title,
        "footer_payment_title",
        MAX_NAME_LEN,
    )?;
    validate_required_text(&req.footer_copyright, "footer_copyright", MAX_NAME_LEN)?;
    validate_required_text(&req.disclaimer, "disclaimer", MAX_CONTENT_LEN)?;
    validate_optional_text(
        &req.payment_disclaimer,
        "payment_disclaimer",
        MAX_CONTENT_LEN,
    )?;

    validate_text_list(&req.home_categories, "home_categories", MAX_NAME_LEN)?;

    for (field, link) in [
        ("discord_link", &req.discord_link),
        ("discord_work_us", &req.discord_work_us),
    ] {
        if let Some(url) = link.as_deref().filter(|s| !s.is_empty()) {
            validate_url(url, field)?;
        }
    }
    Ok(())
}

/// PUT /api/site-config
pub async fn save_config(
    State(state): State<AppState>,
    Json(req): Json<SiteConfigUpdate>,
) -> ApiResult<SiteConfig> {
    validate(&req)?;
    Ok(ApiResponse::success(
        site_content::save_site_config(&state.pool, req).await?,
    ))
}
