use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use chrono::Utc;
use uuid::Uuid;

use slimquest_db::models::{PurchaseRow, RewardRow};
use slimquest_types::api::{Claims, PurchaseResponse, RefundResponse, RewardResponse};

use crate::convert;
use crate::error::ApiError;
use crate::state::{AppState, blocking};

/// GET /rewards
pub async fn list_rewards(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let rows = blocking(&state, |db| db.list_rewards()).await?;
    let rewards: Vec<RewardResponse> = rows.into_iter().map(reward_response).collect();
    Ok(Json(rewards))
}

/// POST /rewards/{reward_id}/purchase
pub async fn purchase(
    State(state): State<AppState>,
    WithRejection(Path(reward_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        db.purchase_reward(&uid, &reward_id.to_string(), Utc::now())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(purchase_response(row))))
}

/// GET /me/purchases
pub async fn list_purchases(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let rows = blocking(&state, move |db| db.user_purchases(&uid)).await?;
    let purchases: Vec<PurchaseResponse> = rows.into_iter().map(purchase_response).collect();
    Ok(Json(purchases))
}

/// POST /purchases/{purchase_id}/use
pub async fn use_purchase(
    State(state): State<AppState>,
    WithRejection(Path(purchase_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let row = blocking(&state, move |db| {
        db.use_purchase(&uid, &purchase_id.to_string(), Utc::now())
    })
    .await?;

    Ok(Json(purchase_response(row)))
}

/// POST /purchases/{purchase_id}/refund
pub async fn refund(
    State(state): State<AppState>,
    WithRejection(Path(purchase_id), _): WithRejection<Path<Uuid>, ApiError>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = claims.sub.to_string();
    let (refunded, balance) = blocking(&state, move |db| {
        db.refund_purchase(&uid, &purchase_id.to_string(), Utc::now())
    })
    .await?;

    Ok(Json(RefundResponse { refunded, balance }))
}

fn reward_response(row: RewardRow) -> RewardResponse {
    RewardResponse {
        id: convert::uuid(&row.id, "reward id"),
        slug: row.slug,
        name: row.name,
        description: row.description,
        price: row.price,
        stock: row.stock,
        active: row.active,
    }
}

fn purchase_response(row: PurchaseRow) -> PurchaseResponse {
    PurchaseResponse {
        id: convert::uuid(&row.id, "purchase id"),
        reward_id: convert::uuid(&row.reward_id, "reward id"),
        reward_name: row.reward_name,
        coins_paid: row.coins_paid,
        purchased_at: convert::timestamp(&row.purchased_at),
        used: row.used,
        used_at: convert::opt_timestamp(row.used_at.as_deref()),
    }
}
