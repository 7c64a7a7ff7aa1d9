pub mod auth;
pub mod badges;
pub mod coins;
mod convert;
pub mod cron;
pub mod error;
pub mod middleware;
pub mod progress;
pub mod quests;
pub mod shop;
pub mod state;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::middleware::{require_auth, require_cron_secret};
use crate::state::AppState;

/// All HTTP routes. Transport layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/leaderboard", get(progress::leaderboard))
        .route("/rewards", get(shop::list_rewards))
        .route("/badges", get(badges::catalog));

    let protected_routes = Router::new()
        .route("/me", get(progress::profile))
        .route("/me/activity", post(progress::record_activity))
        .route("/me/xp", get(progress::xp_history))
        .route("/me/coins", get(coins::ledger))
        .route("/me/quests", get(quests::list))
        .route("/me/badges", get(badges::earned))
        .route("/me/badges/check", post(badges::check))
        .route("/me/purchases", get(shop::list_purchases))
        .route("/rewards/{reward_id}/purchase", post(shop::purchase))
        .route("/purchases/{purchase_id}/use", post(shop::use_purchase))
        .route("/purchases/{purchase_id}/refund", post(shop::refund))
        .layer(from_fn_with_state(state.clone(), require_auth));

    let cron_routes = Router::new()
        .route("/cron/assign-quests", post(cron::assign_quests))
        .route("/cron/cleanup-quests", post(cron::cleanup_quests))
        .layer(from_fn_with_state(state.clone(), require_cron_secret));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(cron_routes)
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
