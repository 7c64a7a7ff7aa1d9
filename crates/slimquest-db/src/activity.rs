use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use slimquest_types::models::{ActivityOutcome, XpAward};

use crate::Database;
use crate::badges::check_badges_in;
use crate::error::EconomyError;
use crate::levels::award_xp_in;
use crate::queries::require_user;
use crate::quests::record_quest_progress_in;
use crate::streaks::update_streak_in;

/// Actions other services report, with the XP each is worth.
pub const ACTIVITY_XP: &[(&str, i64)] = &[
    ("log_weight", 10),
    ("log_meal", 5),
    ("log_mood", 5),
    ("log_calories", 5),
    ("post_comment", 3),
    ("publish_plan", 20),
    ("join_group", 10),
    ("follow_user", 2),
];

pub fn activity_xp(action: &str) -> Option<i64> {
    ACTIVITY_XP.iter().find(|(name, _)| *name == action).map(|(_, xp)| *xp)
}

impl Database {
    /// Streak, XP, quest progress and badges for one user action, in one transaction.
    pub fn record_activity(&self, user_id: &str, action: &str, now: DateTime<Utc>) -> Result<ActivityOutcome> {
        let xp = activity_xp(action).ok_or_else(|| EconomyError::UnknownAction(action.to_string()))?;

        self.transaction(|conn| {
            let previous_level = require_user(conn, user_id)?.level;

            let streak = update_streak_in(conn, user_id, now)?;
            award_xp_in(conn, user_id, xp, &format!("activity:{action}"), now)?;
            let completed_quests = record_quest_progress_in(conn, user_id, action, 1, now)?;
            let new_badges = check_badges_in(conn, user_id, now)?;

            // Streak and quest payouts count towards the reported level change.
            let user = require_user(conn, user_id)?;
            let xp = XpAward {
                xp: user.xp,
                previous_level,
                level: user.level,
                leveled_up: user.level > previous_level,
            };

            info!(
                "Activity {} for {}: streak {}, {} quests done, {} badges",
                action,
                user_id,
                streak.streak,
                completed_quests.len(),
                new_badges.len()
            );

            Ok(ActivityOutcome {
                action: action.to_string(),
                streak,
                xp,
                completed_quests,
                new_badges,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, coins, db, seed_user};

    #[test]
    fn unknown_action_is_rejected() {
        let db = db();
        let id = seed_user(&db, "eve");
        let err = db.record_activity(&id, "teleport", at(2026, 10, 19)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EconomyError>(),
            Some(&EconomyError::UnknownAction("teleport".to_string()))
        );
    }

    #[test]
    fn first_weigh_in_touches_every_module() {
        let db = db();
        let id = seed_user(&db, "fay");

        let outcome = db.record_activity(&id, "log_weight", at(2026, 10, 19)).unwrap();
        assert_eq!(outcome.streak.streak, 1);
        // 10 for the action plus 20 for the daily weigh-in quest.
        assert_eq!(outcome.xp.xp, 30);
        assert_eq!(outcome.completed_quests.len(), 1);
        let badges: Vec<&str> = outcome.new_badges.iter().map(|b| b.slug.as_str()).collect();
        assert_eq!(badges, vec!["quest-rookie"]);
        assert_eq!(coins(&db, &id), 5);
    }

    #[test]
    fn publishing_a_plan_levels_up() {
        let db = db();
        let id = seed_user(&db, "gus");

        let outcome = db.record_activity(&id, "publish_plan", at(2026, 10, 19)).unwrap();
        // 20 for the action plus 100 for the special quest.
        assert_eq!(outcome.xp.xp, 120);
        assert_eq!(outcome.xp.previous_level, 1);
        assert_eq!(outcome.xp.level, 2);
        assert!(outcome.xp.leveled_up);

        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.level, crate::levels::level_for_xp(user.xp));
    }

    #[test]
    fn streak_bonus_counts_towards_level_up() {
        let db = db();
        let id = seed_user(&db, "hal");
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET xp = 90, level = 1, streak = 2, longest_streak = 2, last_active = '2026-10-18'
                 WHERE id = ?1",
                [&id],
            )?;
            Ok(())
        })
        .unwrap();

        let outcome = db.record_activity(&id, "log_calories", at(2026, 10, 19)).unwrap();
        assert_eq!(outcome.streak.streak, 3);
        assert_eq!(outcome.streak.bonuses.len(), 1);
        // 90 + 25 from the 3 day bonus + 5 for the action.
        assert_eq!(outcome.xp.xp, 120);
        assert_eq!(outcome.xp.previous_level, 1);
        assert_eq!(outcome.xp.level, 2);
        assert!(outcome.xp.leveled_up);
    }

    #[test]
    fn unknown_user_is_rejected() {
        let db = db();
        let err = db.record_activity("ghost", "log_meal", at(2026, 10, 19)).unwrap_err();
        assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::UserNotFound));
    }

    #[test]
    fn failed_activity_rolls_back() {
        let db = db();
        let id = seed_user(&db, "ida");
        // Quest progress runs after the streak and XP writes, so this fails mid-transaction.
        db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE user_quests")?;
            Ok(())
        })
        .unwrap();

        assert!(db.record_activity(&id, "log_weight", at(2026, 10, 19)).is_err());

        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.xp, 0);
        assert_eq!(user.streak, 0);
        assert!(user.last_active.is_none());
        assert!(db.xp_history(&id, 10).unwrap().is_empty());
    }
}
