use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use slimquest_types::models::XpAward;

use crate::error::EconomyError;
use crate::models::XpEventRow;
use crate::queries::require_user;
use crate::{Database, time};

/// XP required to reach each level; level N starts at `LEVEL_THRESHOLDS[N - 1]`.
pub const LEVEL_THRESHOLDS: [i64; 20] = [
    0, 100, 250, 450, 700, 1000, 1400, 1900, 2500, 3200, 4000, 5000, 6200, 7600, 9200, 11000,
    13000, 15500, 18500, 22000,
];

pub const MAX_LEVEL: u32 = LEVEL_THRESHOLDS.len() as u32;

/// Highest level whose threshold does not exceed `xp`.
pub fn level_for_xp(xp: i64) -> u32 {
    let reached = LEVEL_THRESHOLDS.iter().take_while(|&&t| t <= xp).count();
    (reached as u32).max(1)
}

/// XP still missing for the next level, `None` once the table is exhausted.
pub fn xp_to_next_level(xp: i64) -> Option<i64> {
    LEVEL_THRESHOLDS.iter().find(|&&t| t > xp).map(|t| t - xp)
}

impl Database {
    pub fn award_xp(
        &self,
        user_id: &str,
        amount: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<XpAward> {
        self.transaction(|conn| award_xp_in(conn, user_id, amount, reason, now))
    }

    /// Newest first.
    pub fn xp_history(&self, user_id: &str, limit: u32) -> Result<Vec<XpEventRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, amount, reason, created_at FROM xp_events
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(XpEventRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        amount: row.get(2)?,
                        reason: row.get(3)?,
                        created_at: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

pub(crate) fn award_xp_in(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<XpAward> {
    if amount <= 0 {
        return Err(EconomyError::InvalidAmount(amount).into());
    }

    let user = require_user(conn, user_id)?;
    let xp = user.xp + amount;
    let level = level_for_xp(xp);

    conn.execute(
        "UPDATE users SET xp = ?1, level = ?2 WHERE id = ?3",
        rusqlite::params![xp, level, user_id],
    )?;
    conn.execute(
        "INSERT INTO xp_events (id, user_id, amount, reason, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![Uuid::new_v4().to_string(), user_id, amount, reason, time::to_db(now)],
    )?;

    let leveled_up = level > user.level;
    if leveled_up {
        info!("User {} reached level {}", user_id, level);
    }

    Ok(XpAward {
        xp,
        previous_level: user.level,
        level,
        leveled_up,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, db, seed_user};

    #[test]
    fn level_lookup_matches_thresholds() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(99), 1);
        assert_eq!(level_for_xp(100), 2);
        assert_eq!(level_for_xp(449), 3);
        assert_eq!(level_for_xp(450), 4);
        assert_eq!(level_for_xp(22_000), MAX_LEVEL);
        assert_eq!(level_for_xp(1_000_000), MAX_LEVEL);
    }

    #[test]
    fn thresholds_are_strictly_increasing() {
        assert_eq!(LEVEL_THRESHOLDS[0], 0);
        assert!(LEVEL_THRESHOLDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn next_level_distance() {
        assert_eq!(xp_to_next_level(0), Some(100));
        assert_eq!(xp_to_next_level(120), Some(130));
        assert_eq!(xp_to_next_level(22_000), None);
    }

    #[test]
    fn award_updates_xp_and_level() {
        let db = db();
        let id = seed_user(&db, "carol");

        let first = db.award_xp(&id, 60, "test", at(2026, 5, 1)).unwrap();
        assert_eq!(first.xp, 60);
        assert!(!first.leveled_up);

        let second = db.award_xp(&id, 200, "test", at(2026, 5, 1)).unwrap();
        assert_eq!(second.xp, 260);
        assert_eq!(second.previous_level, 1);
        assert_eq!(second.level, 3);
        assert!(second.leveled_up);

        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.level, level_for_xp(user.xp));
        assert_eq!(db.xp_history(&id, 10).unwrap().len(), 2);
    }

    #[test]
    fn rejects_non_positive_amounts_and_unknown_users() {
        let db = db();
        let id = seed_user(&db, "dave");

        let err = db.award_xp(&id, 0, "nothing", at(2026, 5, 1)).unwrap_err();
        assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::InvalidAmount(0)));

        let err = db.award_xp("missing", 10, "ghost", at(2026, 5, 1)).unwrap_err();
        assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::UserNotFound));
        assert!(db.xp_history(&id, 10).unwrap().is_empty());
    }
}
