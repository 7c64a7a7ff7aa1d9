use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::info;

use slimquest_types::models::{StreakBonusGrant, StreakChange, StreakUpdate, TransactionKind};

use crate::badges::award_badge_in;
use crate::coins::record_transaction_in;
use crate::levels::award_xp_in;
use crate::queries::require_user;
use crate::{Database, time};

/// Streak after activity on `today`, given the previous active day.
pub fn next_streak(last_active: Option<NaiveDate>, streak: u32, today: NaiveDate) -> (u32, StreakChange) {
    match last_active {
        // A date ahead of `today` comes from clock skew; treat it as today.
        Some(last) if last >= today => (streak.max(1), StreakChange::Unchanged),
        Some(last) if last.succ_opt() == Some(today) => (streak + 1, StreakChange::Extended),
        _ => (1, StreakChange::Reset),
    }
}

struct BonusRow {
    id: String,
    days: u32,
    coins: i64,
    xp: i64,
    badge_slug: Option<String>,
}

impl Database {
    pub fn update_streak(&self, user_id: &str, now: DateTime<Utc>) -> Result<StreakUpdate> {
        self.transaction(|conn| update_streak_in(conn, user_id, now))
    }
}

pub(crate) fn update_streak_in(conn: &Connection, user_id: &str, now: DateTime<Utc>) -> Result<StreakUpdate> {
    let user = require_user(conn, user_id)?;
    let today = now.date_naive();
    let last_active = user.last_active.as_deref().map(time::date_from_db).transpose()?;

    let (streak, change) = next_streak(last_active, user.streak, today);
    if change == StreakChange::Unchanged {
        return Ok(StreakUpdate {
            streak,
            longest_streak: user.longest_streak,
            change,
            bonuses: vec![],
        });
    }

    let longest_streak = user.longest_streak.max(streak);
    conn.execute(
        "UPDATE users SET streak = ?1, longest_streak = ?2, last_active = ?3 WHERE id = ?4",
        rusqlite::params![streak, longest_streak, time::date_to_db(today), user_id],
    )?;

    let bonuses = grant_milestones(conn, user_id, streak, now)?;

    Ok(StreakUpdate {
        streak,
        longest_streak,
        change,
        bonuses,
    })
}

/// Grant every milestone at or below `streak` that the user has not received yet.
fn grant_milestones(
    conn: &Connection,
    user_id: &str,
    streak: u32,
    now: DateTime<Utc>,
) -> Result<Vec<StreakBonusGrant>> {
    let mut stmt = conn.prepare(
        "SELECT id, days, coins, xp, badge_slug FROM streak_bonuses
         WHERE days <= ?2
           AND id NOT IN (SELECT bonus_id FROM user_streak_bonuses WHERE user_id = ?1)
         ORDER BY days",
    )?;
    let pending = stmt
        .query_map(rusqlite::params![user_id, streak], |row| {
            Ok(BonusRow {
                id: row.get(0)?,
                days: row.get(1)?,
                coins: row.get(2)?,
                xp: row.get(3)?,
                badge_slug: row.get(4)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut granted = Vec::new();
    for bonus in pending {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO user_streak_bonuses (user_id, bonus_id, granted_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id, bonus.id, time::to_db(now)],
        )?;
        if inserted == 0 {
            continue;
        }

        let label = format!("{}-day streak", bonus.days);
        if bonus.coins > 0 {
            record_transaction_in(conn, user_id, bonus.coins, TransactionKind::Bonus, &label, now)?;
        }
        if bonus.xp > 0 {
            award_xp_in(conn, user_id, bonus.xp, &label, now)?;
        }
        if let Some(slug) = &bonus.badge_slug {
            award_badge_in(conn, user_id, slug, now)?;
        }

        info!("User {} reached {} milestone", user_id, label);
        granted.push(StreakBonusGrant {
            days: bonus.days,
            coins: bonus.coins,
            xp: bonus.xp,
            badge: bonus.badge_slug,
        });
    }

    Ok(granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, coins, db, seed_user};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, d).unwrap()
    }

    #[test]
    fn streak_transitions() {
        assert_eq!(next_streak(None, 0, day(10)), (1, StreakChange::Reset));
        assert_eq!(next_streak(Some(day(9)), 4, day(10)), (5, StreakChange::Extended));
        assert_eq!(next_streak(Some(day(10)), 4, day(10)), (4, StreakChange::Unchanged));
        assert_eq!(next_streak(Some(day(7)), 4, day(10)), (1, StreakChange::Reset));
        assert_eq!(next_streak(Some(day(12)), 4, day(10)), (4, StreakChange::Unchanged));
    }

    #[test]
    fn streak_crosses_month_boundary() {
        let last = NaiveDate::from_ymd_opt(2026, 3, 31).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();
        assert_eq!(next_streak(Some(last), 2, today), (3, StreakChange::Extended));
    }

    #[test]
    fn same_day_is_a_no_op() {
        let db = db();
        let id = seed_user(&db, "mia");

        let first = db.update_streak(&id, at(2026, 4, 1)).unwrap();
        assert_eq!(first.streak, 1);
        let again = db.update_streak(&id, at(2026, 4, 1)).unwrap();
        assert_eq!(again.change, StreakChange::Unchanged);
        assert_eq!(again.streak, 1);
    }

    #[test]
    fn milestone_granted_once() {
        let db = db();
        let id = seed_user(&db, "noah");

        for d in 1..=3 {
            db.update_streak(&id, at(2026, 4, d)).unwrap();
        }
        assert_eq!(coins(&db, &id), 10);

        // Break the streak and climb back past three days.
        for d in 10..=13 {
            db.update_streak(&id, at(2026, 4, d)).unwrap();
        }
        assert_eq!(coins(&db, &id), 10);

        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.streak, 4);
        assert_eq!(user.longest_streak, 4);
        assert_eq!(user.xp, 25);
    }

    #[test]
    fn week_milestone_grants_badge() {
        let db = db();
        let id = seed_user(&db, "olga");

        let mut last = None;
        for d in 1..=7 {
            last = Some(db.update_streak(&id, at(2026, 4, d)).unwrap());
        }
        let last = last.unwrap();
        assert_eq!(last.streak, 7);
        assert_eq!(last.bonuses.len(), 1);
        assert_eq!(last.bonuses[0].badge.as_deref(), Some("week-warrior"));

        let badges: Vec<String> = db.user_badges(&id).unwrap().into_iter().map(|b| b.slug).collect();
        assert_eq!(badges, vec!["week-warrior"]);
        assert_eq!(coins(&db, &id), 35);
    }

    #[test]
    fn reset_keeps_longest_streak() {
        let db = db();
        let id = seed_user(&db, "pete");
        for d in 1..=5 {
            db.update_streak(&id, at(2026, 4, d)).unwrap();
        }
        let update = db.update_streak(&id, at(2026, 4, 20)).unwrap();
        assert_eq!(update.change, StreakChange::Reset);
        assert_eq!(update.streak, 1);
        assert_eq!(update.longest_streak, 5);
    }
}
