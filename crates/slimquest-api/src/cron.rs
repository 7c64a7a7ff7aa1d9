use axum::{Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// POST /cron/assign-quests
pub async fn assign_quests(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let assigned = blocking(&state, |db| db.assign_quests(Utc::now())).await?;
    info!("Cron: assigned {} quest instances", assigned);
    Ok(Json(json!({ "assigned": assigned })))
}

/// POST /cron/cleanup-quests
pub async fn cleanup_quests(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let expired = blocking(&state, |db| db.cleanup_expired_quests(Utc::now())).await?;
    info!("Cron: removed {} expired quest instances", expired);
    Ok(Json(json!({ "expired": expired })))
}
