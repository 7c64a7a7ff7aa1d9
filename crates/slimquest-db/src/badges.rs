use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

use slimquest_types::models::{BadgeCriterion, EarnedBadge};

use crate::error::EconomyError;
use crate::models::BadgeRow;
use crate::queries::{OptionalExt, require_user};
use crate::{Database, time};

/// Aggregate figures badge thresholds are compared against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub xp: i64,
    pub level: i64,
    pub streak: i64,
    pub longest_streak: i64,
    pub quests_completed: i64,
    pub rewards_purchased: i64,
    pub coins_earned: i64,
}

impl UserStats {
    /// Value for `criterion`; `None` for badges that are only granted explicitly.
    pub fn value(&self, criterion: BadgeCriterion) -> Option<i64> {
        match criterion {
            BadgeCriterion::Xp => Some(self.xp),
            BadgeCriterion::Level => Some(self.level),
            // Best streak ever reached, not the current one.
            BadgeCriterion::Streak => Some(self.longest_streak.max(self.streak)),
            BadgeCriterion::Quests => Some(self.quests_completed),
            BadgeCriterion::Purchases => Some(self.rewards_purchased),
            BadgeCriterion::Coins => Some(self.coins_earned),
            BadgeCriterion::Manual => None,
        }
    }
}

impl Database {
    /// Full catalog.
    pub fn badge_catalog(&self) -> Result<Vec<BadgeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slug, name, description, criterion, threshold, NULL
                 FROM badges ORDER BY criterion, threshold, slug",
            )?;
            let rows = stmt
                .query_map([], map_badge)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Badges held by `user_id`, oldest first.
    pub fn user_badges(&self, user_id: &str) -> Result<Vec<BadgeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT b.id, b.slug, b.name, b.description, b.criterion, b.threshold, ub.earned_at
                 FROM user_badges ub
                 JOIN badges b ON b.id = ub.badge_id
                 WHERE ub.user_id = ?1
                 ORDER BY ub.earned_at, b.slug",
            )?;
            let rows = stmt
                .query_map([user_id], map_badge)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Award every badge whose threshold the user now meets. Returns only
    /// badges that were not held before this call.
    pub fn check_badges(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<EarnedBadge>> {
        self.transaction(|conn| check_badges_in(conn, user_id, now))
    }

    pub fn award_badge(&self, user_id: &str, slug: &str, now: DateTime<Utc>) -> Result<Option<EarnedBadge>> {
        self.transaction(|conn| award_badge_in(conn, user_id, slug, now))
    }
}

pub(crate) fn user_stats_in(conn: &Connection, user_id: &str) -> Result<UserStats> {
    let user = require_user(conn, user_id)?;

    let quests_completed: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_quests WHERE user_id = ?1 AND completed_at IS NOT NULL",
        [user_id],
        |row| row.get(0),
    )?;
    let rewards_purchased: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_rewards WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    let coins_earned: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM coin_transactions
         WHERE user_id = ?1 AND kind IN ('earned', 'bonus')",
        [user_id],
        |row| row.get(0),
    )?;

    Ok(UserStats {
        xp: user.xp,
        level: i64::from(user.level),
        streak: i64::from(user.streak),
        longest_streak: i64::from(user.longest_streak),
        quests_completed,
        rewards_purchased,
        coins_earned,
    })
}

pub(crate) fn check_badges_in(conn: &Connection, user_id: &str, now: DateTime<Utc>) -> Result<Vec<EarnedBadge>> {
    let stats = user_stats_in(conn, user_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, slug, name, description, criterion, threshold, NULL FROM badges
         WHERE criterion != 'manual'
           AND id NOT IN (SELECT badge_id FROM user_badges WHERE user_id = ?1)
         ORDER BY threshold, slug",
    )?;
    let candidates = stmt
        .query_map([user_id], map_badge)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut earned = Vec::new();
    for badge in candidates {
        let criterion: BadgeCriterion = badge.criterion.parse()?;
        let qualifies = stats.value(criterion).is_some_and(|v| v >= badge.threshold);
        if qualifies && insert_user_badge(conn, user_id, &badge.id, now)? {
            info!("User {} earned badge {}", user_id, badge.slug);
            earned.push(EarnedBadge {
                slug: badge.slug,
                name: badge.name,
            });
        }
    }

    Ok(earned)
}

pub(crate) fn award_badge_in(
    conn: &Connection,
    user_id: &str,
    slug: &str,
    now: DateTime<Utc>,
) -> Result<Option<EarnedBadge>> {
    require_user(conn, user_id)?;

    let (badge_id, name): (String, String) = conn
        .query_row("SELECT id, name FROM badges WHERE slug = ?1", [slug], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .optional()?
        .ok_or(EconomyError::NotFound("badge"))?;

    if !insert_user_badge(conn, user_id, &badge_id, now)? {
        return Ok(None);
    }

    info!("User {} earned badge {}", user_id, slug);
    Ok(Some(EarnedBadge {
        slug: slug.to_string(),
        name,
    }))
}

/// Returns false when the user already holds the badge.
fn insert_user_badge(conn: &Connection, user_id: &str, badge_id: &str, now: DateTime<Utc>) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO user_badges (user_id, badge_id, earned_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, badge_id, time::to_db(now)],
    )?;
    Ok(inserted == 1)
}

fn map_badge(row: &rusqlite::Row<'_>) -> rusqlite::Result<BadgeRow> {
    Ok(BadgeRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        criterion: row.get(4)?,
        threshold: row.get(5)?,
        earned_at: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, db, give_coins, seed_user};
    use slimquest_types::models::TransactionKind;

    const STREAK_FREEZE: &str = "00000000-0000-0000-0002-000000000001";

    #[test]
    fn check_is_idempotent() {
        let db = db();
        let id = seed_user(&db, "ivy");
        db.award_xp(&id, 120, "test", at(2026, 3, 1)).unwrap();

        let first = db.check_badges(&id, at(2026, 3, 1)).unwrap();
        let slugs: Vec<&str> = first.iter().map(|b| b.slug.as_str()).collect();
        assert_eq!(slugs, vec!["first-steps"]);

        assert!(db.check_badges(&id, at(2026, 3, 2)).unwrap().is_empty());
        assert_eq!(db.user_badges(&id).unwrap().len(), 1);
    }

    #[test]
    fn thresholds_across_criteria() {
        let db = db();
        let id = seed_user(&db, "jack");
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET xp = 1000, level = 6, streak = 2, longest_streak = 6 WHERE id = ?1",
                [&id],
            )?;
            Ok(())
        })
        .unwrap();

        let mut slugs: Vec<String> = db
            .check_badges(&id, at(2026, 3, 1))
            .unwrap()
            .into_iter()
            .map(|b| b.slug)
            .collect();
        slugs.sort();
        assert_eq!(slugs, vec!["dedicated", "first-steps", "on-fire", "rising-star"]);
    }

    #[test]
    fn manual_badges_are_never_auto_awarded() {
        let db = db();
        let id = seed_user(&db, "kate");
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET streak = 100, longest_streak = 100 WHERE id = ?1", [&id])?;
            Ok(())
        })
        .unwrap();

        let earned = db.check_badges(&id, at(2026, 3, 1)).unwrap();
        assert!(earned.iter().all(|b| b.slug != "centurion"));

        let granted = db.award_badge(&id, "centurion", at(2026, 3, 1)).unwrap();
        assert_eq!(granted.map(|b| b.slug), Some("centurion".to_string()));
        assert!(db.award_badge(&id, "centurion", at(2026, 3, 2)).unwrap().is_none());
    }

    #[test]
    fn unknown_badge_slug() {
        let db = db();
        let id = seed_user(&db, "liam");
        let err = db.award_badge(&id, "no-such-badge", at(2026, 3, 1)).unwrap_err();
        assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::NotFound("badge")));
    }

    #[test]
    fn coins_earned_ignores_spending_and_refunds() {
        let db = db();
        let id = seed_user(&db, "mia");
        give_coins(&db, &id, 300);
        db.record_coin_transaction(&id, 150, TransactionKind::Earned, "quest", at(2026, 3, 1))
            .unwrap();
        db.record_coin_transaction(&id, -400, TransactionKind::Spent, "shop", at(2026, 3, 1))
            .unwrap();
        db.record_coin_transaction(&id, 100, TransactionKind::Refund, "shop", at(2026, 3, 1))
            .unwrap();

        let stats = db.with_conn(|conn| user_stats_in(conn, &id)).unwrap();
        assert_eq!(stats.coins_earned, 450);
        assert!(db.check_badges(&id, at(2026, 3, 1)).unwrap().is_empty());

        give_coins(&db, &id, 50);
        let earned = db.check_badges(&id, at(2026, 3, 2)).unwrap();
        assert_eq!(earned.into_iter().map(|b| b.slug).collect::<Vec<_>>(), vec!["coin-collector"]);
    }

    #[test]
    fn purchases_unlock_shop_badge() {
        let db = db();
        let id = seed_user(&db, "noah");
        give_coins(&db, &id, 100);
        assert!(db.check_badges(&id, at(2026, 3, 1)).unwrap().is_empty());

        db.purchase_reward(&id, STREAK_FREEZE, at(2026, 3, 1)).unwrap();
        let earned = db.check_badges(&id, at(2026, 3, 1)).unwrap();
        assert_eq!(earned.into_iter().map(|b| b.slug).collect::<Vec<_>>(), vec!["first-purchase"]);
    }
}
