use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;

use slimquest_db::models::BadgeRow;
use slimquest_types::api::{BadgeResponse, Claims};
use slimquest_types::models::BadgeCriterion;

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// GET /badges
pub async fn catalog(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, |db| db.badge_catalog()).await?;
    let badges: Vec<BadgeResponse> = rows.into_iter().map(badge_response).collect();
    Ok(Json(badges))
}

/// GET /me/badges
pub async fn earned(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = blocking(&state, move |db| db.user_badges(&uid)).await?;
    let badges: Vec<BadgeResponse> = rows.into_iter().map(badge_response).collect();
    Ok(Json(badges))
}

/// POST /me/badges/check — returns only badges earned by this call.
pub async fn check(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let earned = blocking(&state, move |db| db.check_badges(&uid, Utc::now())).await?;
    Ok(Json(earned))
}

fn badge_response(row: BadgeRow) -> BadgeResponse {
    BadgeResponse {
        criterion: convert::parse_enum(&row.criterion, BadgeCriterion::Manual),
        earned_at: convert::opt_timestamp(row.earned_at.as_deref()),
        slug: row.slug,
        name: row.name,
        description: row.description,
        threshold: row.threshold,
    }
}
