use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{BadgeCriterion, QuestPeriod, TransactionKind};

// -- JWT Claims --

/// Bearer token claims issued at login and checked by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Profile --

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub id: Uuid,
    pub username: String,
    pub xp: i64,
    pub level: u32,
    /// XP still needed for the next level; `None` at max level.
    pub xp_to_next_level: Option<i64>,
    pub streak: u32,
    pub longest_streak: u32,
    pub last_active: Option<NaiveDate>,
    pub coins: i64,
}

// -- Activity --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityRequest {
    pub action: String,
}

// -- History --

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_history_limit")]
    pub limit: u32,
}

fn default_history_limit() -> u32 {
    50
}

#[derive(Debug, Serialize, Deserialize)]
pub struct XpEventResponse {
    pub id: Uuid,
    pub amount: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoinTransactionResponse {
    pub id: Uuid,
    pub amount: i64,
    pub kind: TransactionKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CoinLedgerResponse {
    pub balance: i64,
    pub transactions: Vec<CoinTransactionResponse>,
}

// -- Quests --

#[derive(Debug, Serialize, Deserialize)]
pub struct UserQuestResponse {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub period: QuestPeriod,
    pub period_key: String,
    pub action: String,
    pub progress: i64,
    pub target: i64,
    pub xp_reward: i64,
    pub coin_reward: i64,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

// -- Shop --

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardResponse {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    /// `None` means unlimited stock.
    pub stock: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PurchaseResponse {
    pub id: Uuid,
    pub reward_id: Uuid,
    pub reward_name: String,
    pub coins_paid: i64,
    pub purchased_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RefundResponse {
    pub refunded: i64,
    pub balance: i64,
}

// -- Badges --

#[derive(Debug, Serialize, Deserialize)]
pub struct BadgeResponse {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub criterion: BadgeCriterion,
    pub threshold: i64,
    pub earned_at: Option<DateTime<Utc>>,
}

// -- Leaderboard --

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: Uuid,
    pub username: String,
    pub xp: i64,
    pub level: u32,
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
