//! Policy page endpoints

use axum::{Json, Router, extract::State, routing::get};
use shared::error::{ApiResponse, AppError};
use shared::models::{POLICY_SECTION_COUNT, Policies, PoliciesUpdate};

use super::ApiResult;
use crate::db::site_content;
use crate::state::AppState;
use crate::validation::{MAX_CONTENT_LEN, MAX_NAME_LEN, validate_required_text};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/policies", get(get_policies).put(save_policies))
}

/// GET /api/policies
pub async fn get_policies(State(state): State<AppState>) -> ApiResult<Policies> {
    Ok(ApiResponse::success(
        site_content::get_policies(&state.pool).await?,
    ))
}

/// Blank sections are cleared, not rejected.
fn validate(req: &PoliciesUpdate) -> Result<(), AppError> {
    if req.sections.len() > POLICY_SECTION_COUNT {
        return Err(AppError::invalid_field(
            "sections",
            format!("At most {POLICY_SECTION_COUNT} sections are supported"),
        ));
    }
    for section in req.sections.iter().flatten() {
        if section.title.trim().is_empty() || section.content.trim().is_empty() {
            continue;
        }
        validate_required_text(&section.title, "title", MAX_NAME_LEN)?;
        validate_required_text(&section.content, "content", MAX_CONTENT_LEN)?;
    }
    Ok(())
}

/// PUT /api/policies
pub async fn save_policies(
    State(state): State<AppState>,
    Json(req): Json<PoliciesUpdate>,
) -> ApiResult<Policies> {
    validate(&req)?;
    Ok(ApiResponse::success(
        site_content::save_policies(&state.pool, req).await?,
    ))
}
