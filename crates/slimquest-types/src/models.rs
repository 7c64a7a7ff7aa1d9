use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry kind. `Spent` entries carry a negative amount, all others positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Earned,
    Spent,
    Bonus,
    Refund,
}

impl TransactionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Earned => "earned",
            Self::Spent => "spent",
            Self::Bonus => "bonus",
            Self::Refund => "refund",
        }
    }

    /// Whether `amount` has the sign this kind requires.
    pub fn accepts(self, amount: i64) -> bool {
        match self {
            Self::Spent => amount < 0,
            _ => amount > 0,
        }
    }
}

/// How often a quest template is handed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestPeriod {
    Daily,
    Weekly,
    Special,
}

/// Aggregate stat a badge threshold is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCriterion {
    Xp,
    Level,
    Streak,
    Quests,
    Purchases,
    /// Lifetime coins from `earned` and `bonus` ledger entries.
    Coins,
    /// Only granted explicitly (streak milestones).
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant(pub String);

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown variant '{}'", self.0)
    }
}

impl std::error::Error for UnknownVariant {}

impl FromStr for TransactionKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "earned" => Ok(Self::Earned),
            "spent" => Ok(Self::Spent),
            "bonus" => Ok(Self::Bonus),
            "refund" => Ok(Self::Refund),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for QuestPeriod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "special" => Ok(Self::Special),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

impl FromStr for BadgeCriterion {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xp" => Ok(Self::Xp),
            "level" => Ok(Self::Level),
            "streak" => Ok(Self::Streak),
            "quests" => Ok(Self::Quests),
            "purchases" => Ok(Self::Purchases),
            "coins" => Ok(Self::Coins),
            "manual" => Ok(Self::Manual),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Result of an XP award.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpAward {
    pub xp: i64,
    pub previous_level: u32,
    pub level: u32,
    pub leveled_up: bool,
}

/// A streak milestone reached for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakBonusGrant {
    pub days: u32,
    pub coins: i64,
    pub xp: i64,
    pub badge: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakChange {
    Unchanged,
    Extended,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakUpdate {
    pub streak: u32,
    pub longest_streak: u32,
    pub change: StreakChange,
    pub bonuses: Vec<StreakBonusGrant>,
}

/// A quest instance that crossed its target during a progress update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedQuest {
    pub user_quest_id: Uuid,
    pub slug: String,
    pub xp_reward: i64,
    pub coin_reward: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnedBadge {
    pub slug: String,
    pub name: String,
}

/// Everything that happened as a consequence of one recorded activity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityOutcome {
    pub action: String,
    pub streak: StreakUpdate,
    pub xp: XpAward,
    pub completed_quests: Vec<CompletedQuest>,
    pub new_badges: Vec<EarnedBadge>,
}

/// Counts from one run of the quest maintenance job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub assigned: usize,
    pub expired: usize,
}
