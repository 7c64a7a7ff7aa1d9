use axum::{
    Extension, Json,
    extract::State,
    response::IntoResponse,
};
use chrono::Utc;

use slimquest_db::models::UserQuestRow;
use slimquest_types::api::{Claims, UserQuestResponse};
use slimquest_types::models::QuestPeriod;

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// GET /me/quests — live instances for the current cycles.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = blocking(&state, move |db| db.user_quests(&uid, Utc::now())).await?;
    let quests: Vec<UserQuestResponse> = rows.into_iter().map(quest_response).collect();
    Ok(Json(quests))
}

fn quest_response(row: UserQuestRow) -> UserQuestResponse {
    UserQuestResponse {
        id: convert::uuid(&row.id, "user quest id"),
        period: convert::parse_enum(&row.period, QuestPeriod::Special),
        completed_at: convert::opt_timestamp(row.completed_at.as_deref()),
        expires_at: convert::opt_timestamp(row.expires_at.as_deref()),
        slug: row.slug,
        title: row.title,
        period_key: row.period_key,
        action: row.action,
        progress: row.progress,
        target: row.target,
        xp_reward: row.xp_reward,
        coin_reward: row.coin_reward,
    }
}
