//! Ordering maintenance endpoints

use axum::{
    Extension, Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Deserialize;
use shared::error::ApiResponse;
use shared::ordering::{OrderedKind, ScopeKey};

use super::ApiResult;
use crate::auth::AdminIdentity;
use crate::db::catalog::audit::{self, AuditReport};
use crate::db::ordering::engine::Repair;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/ordering/audit", get(audit_all))
        .route("/api/ordering/repair", post(repair))
}

#[derive(Debug, Deserialize)]
pub struct RepairRequest {
    pub kind: OrderedKind,
    pub scope: ScopeKey,
}

/// GET /api/ordering/audit
pub async fn audit_all(State(state): State<AppState>) -> ApiResult<AuditReport> {
    Ok(ApiResponse::success(audit::audit_all(&state.ordering).await?))
}

/// POST /api/ordering/repair
pub async fn repair(
    State(state): State<AppState>,
    Extension(identity): Extension<AdminIdentity>,
    Json(req): Json<RepairRequest>,
) -> ApiResult<Repair> {
    tracing::info!(
        user = %identity.user_id,
        kind = %req.kind,
        scope = %req.scope,
        "Scope repair requested"
    );
    Ok(ApiResponse::success(
        audit::repair(&state.ordering, req.kind, req.scope).await?,
    ))
}
