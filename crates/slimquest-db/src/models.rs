/// Database row types. These map directly to SQLite rows and are kept
/// distinct from the slimquest-types API models.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub xp: i64,
    pub level: u32,
    pub streak: u32,
    pub longest_streak: u32,
    pub last_active: Option<String>,
    pub coins: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct XpEventRow {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub reason: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct CoinTransactionRow {
    pub id: String,
    pub user_id: String,
    pub amount: i64,
    pub kind: String,
    pub description: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct BadgeRow {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub criterion: String,
    pub threshold: i64,
    /// Set only when the row was loaded for a specific user.
    pub earned_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct QuestRow {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub period: String,
    pub action: String,
    pub target: i64,
    pub xp_reward: i64,
    pub coin_reward: i64,
}

#[derive(Debug, Clone)]
pub struct UserQuestRow {
    pub id: String,
    pub user_id: String,
    pub quest_id: String,
    pub slug: String,
    pub title: String,
    pub period: String,
    pub period_key: String,
    pub action: String,
    pub progress: i64,
    pub target: i64,
    pub xp_reward: i64,
    pub coin_reward: i64,
    pub expires_at: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RewardRow {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: i64,
    pub stock: Option<i64>,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct PurchaseRow {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    pub reward_name: String,
    pub coins_paid: i64,
    pub purchased_at: String,
    pub used: bool,
    pub used_at: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LeaderboardRow {
    pub user_id: String,
    pub username: String,
    pub xp: i64,
    pub level: u32,
}
