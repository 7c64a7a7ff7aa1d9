use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;

use slimquest_db::levels::xp_to_next_level;
use slimquest_types::api::{
    ActivityRequest, Claims, HistoryQuery, LeaderboardEntry, LeaderboardQuery, ProfileResponse,
    XpEventResponse,
};

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

const DEFAULT_LEADERBOARD_SIZE: u32 = 10;
const MAX_LEADERBOARD_SIZE: u32 = 100;

/// GET /me
pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let user = blocking(&state, move |db| db.get_user_by_id(&uid))
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".into()))?;

    Ok(Json(ProfileResponse {
        id: claims.sub,
        username: user.username,
        xp: user.xp,
        level: user.level,
        xp_to_next_level: xp_to_next_level(user.xp),
        streak: user.streak,
        longest_streak: user.longest_streak,
        last_active: convert::opt_date(user.last_active.as_deref()),
        coins: user.coins,
    }))
}

/// POST /me/activity
pub async fn record_activity(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Json(req), _): WithRejection<Json<ActivityRequest>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let outcome = blocking(&state, move |db| db.record_activity(&uid, &req.action, Utc::now())).await?;
    Ok(Json(outcome))
}

/// GET /me/xp
pub async fn xp_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    WithRejection(Query(query), _): WithRejection<Query<HistoryQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let limit = convert::page_limit(query.limit);
    let rows = blocking(&state, move |db| db.xp_history(&uid, limit)).await?;

    let events: Vec<XpEventResponse> = rows
        .into_iter()
        .map(|row| XpEventResponse {
            id: convert::uuid(&row.id, "xp event id"),
            amount: row.amount,
            reason: row.reason,
            created_at: convert::timestamp(&row.created_at),
        })
        .collect();

    Ok(Json(events))
}

/// GET /leaderboard
pub async fn leaderboard(
    State(state): State<AppState>,
    WithRejection(Query(query), _): WithRejection<Query<LeaderboardQuery>, ApiError>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
        .clamp(1, MAX_LEADERBOARD_SIZE);
    let rows = blocking(&state, move |db| db.leaderboard(limit)).await?;

    let entries: Vec<LeaderboardEntry> = rows
        .into_iter()
        .zip(1..)
        .map(|(row, rank)| LeaderboardEntry {
            rank,
            user_id: convert::uuid(&row.user_id, "user id"),
            username: row.username,
            xp: row.xp,
            level: row.level,
        })
        .collect();

    Ok(Json(entries))
}
