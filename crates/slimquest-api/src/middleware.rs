use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use sha2::{Digest, Sha256};
use tracing::warn;

use slimquest_types::api::Claims;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
}

/// Extract and validate JWT from Authorization header.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer(&req).ok_or(ApiError::Unauthorized)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Gate for scheduler-triggered endpoints: the bearer token must equal the
/// configured cron secret.
pub async fn require_cron_secret(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.cron_secret.is_empty() {
        return Err(ApiError::Forbidden("cron endpoints are disabled".into()));
    }

    let presented = bearer(&req).ok_or(ApiError::Unauthorized)?;

    // Compare digests so the check does not short-circuit on the first differing byte.
    if Sha256::digest(presented.as_bytes()) != Sha256::digest(state.cron_secret.as_bytes()) {
        warn!("Rejected cron call with a bad secret");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(req).await)
}
