//! Admin JWT verification for the management API
//!
//! Tokens are issued by the identity provider; this server only verifies
//! them and requires the `admin` role.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use shared::error::AppError;

use crate::state::AppState;

pub const ADMIN_ROLE: &str = "admin";

/// JWT claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct AdminClaims {
    /// User ID
    pub sub: String,
    pub role: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

/// Authenticated administrator extracted from JWT
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    pub user_id: String,
}

fn verify(token: &str, secret: &str) -> Result<AdminIdentity, AppError> {
    let token_data = jsonwebtoken::decode::<AdminClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::debug!("JWT validation failed: {e}");
        match e.kind() {
            ErrorKind::ExpiredSignature => AppError::token_expired(),
            _ => AppError::invalid_token("Invalid token"),
        }
    })?;

    if token_data.claims.role != ADMIN_ROLE {
        tracing::warn!(
            user = %token_data.claims.sub,
            role = %token_data.claims.role,
            "Non-admin token rejected"
        );
        return Err(AppError::admin_required());
    }

    Ok(AdminIdentity {
        user_id: token_data.claims.sub,
    })
}

/// Middleware that verifies the admin JWT from the Authorization header
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let auth_header = request
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::not_authenticated().into_response())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::invalid_token("Invalid Authorization format").into_response())?;

    let identity = verify(token, &state.jwt_secret).map_err(IntoResponse::into_response)?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
