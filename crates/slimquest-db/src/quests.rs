use anyhow::Result;
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use slimquest_types::models::{CompletedQuest, QuestPeriod, TransactionKind};

use crate::coins::record_transaction_in;
use crate::error::EconomyError;
use crate::levels::award_xp_in;
use crate::models::{QuestRow, UserQuestRow};
use crate::queries::{all_user_ids, require_user};
use crate::{Database, time};

/// Identifies the assignment cycle a quest instance belongs to.
pub fn period_key(period: QuestPeriod, today: NaiveDate) -> String {
    match period {
        QuestPeriod::Daily => time::date_to_db(today),
        QuestPeriod::Weekly => {
            let week = today.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        QuestPeriod::Special => "special".to_string(),
    }
}

/// Midnight UTC at the end of the cycle; special quests never expire.
pub fn period_end(period: QuestPeriod, today: NaiveDate) -> Option<DateTime<Utc>> {
    let next_start = match period {
        QuestPeriod::Daily => today.checked_add_days(Days::new(1))?,
        QuestPeriod::Weekly => {
            let into_week = u64::from(today.weekday().num_days_from_monday());
            today.checked_add_days(Days::new(7 - into_week))?
        }
        QuestPeriod::Special => return None,
    };
    Some(next_start.and_hms_opt(0, 0, 0)?.and_utc())
}

const USER_QUEST_SELECT: &str = "
    SELECT uq.id, uq.user_id, uq.quest_id, q.slug, q.title, q.period, uq.period_key, q.action,
           uq.progress, q.target, q.xp_reward, q.coin_reward, uq.expires_at, uq.completed_at
    FROM user_quests uq
    JOIN quests q ON q.id = uq.quest_id";

impl Database {
    /// Hand out current-period instances of every active template to every
    /// user. Safe to re-run; returns how many instances were created.
    pub fn assign_quests(&self, now: DateTime<Utc>) -> Result<usize> {
        self.transaction(|conn| {
            let templates = active_templates(conn)?;
            let mut assigned = 0;
            for user_id in all_user_ids(conn)? {
                assigned += assign_for_user_in(conn, &user_id, &templates, now)?;
            }
            info!("Assigned {} quest instances", assigned);
            Ok(assigned)
        })
    }

    /// Drop expired instances that were never completed. Completed instances stay as history.
    pub fn cleanup_expired_quests(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM user_quests
                 WHERE completed_at IS NULL
                   AND expires_at IS NOT NULL
                   AND expires_at <= ?1",
                [time::to_db(now)],
            )?;
            info!("Removed {} expired quest instances", removed);
            Ok(removed)
        })
    }

    pub fn record_quest_progress(
        &self,
        user_id: &str,
        action: &str,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<CompletedQuest>> {
        self.transaction(|conn| record_quest_progress_in(conn, user_id, action, amount, now))
    }

    /// Instances that are still live at `now`, including ones already completed.
    pub fn user_quests(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<UserQuestRow>> {
        self.transaction(|conn| {
            require_user(conn, user_id)?;
            let templates = active_templates(conn)?;
            assign_for_user_in(conn, user_id, &templates, now)?;

            let sql = format!(
                "{USER_QUEST_SELECT}
                 WHERE uq.user_id = ?1 AND (uq.expires_at IS NULL OR uq.expires_at > ?2)
                 ORDER BY CASE q.period WHEN 'daily' THEN 0 WHEN 'weekly' THEN 1 ELSE 2 END, q.slug"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, time::to_db(now)], map_user_quest)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn active_templates(conn: &Connection) -> Result<Vec<QuestRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, slug, title, description, period, action, target, xp_reward, coin_reward
         FROM quests WHERE active = 1 ORDER BY slug",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(QuestRow {
                id: row.get(0)?,
                slug: row.get(1)?,
                title: row.get(2)?,
                description: row.get(3)?,
                period: row.get(4)?,
                action: row.get(5)?,
                target: row.get(6)?,
                xp_reward: row.get(7)?,
                coin_reward: row.get(8)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Uniqueness on (user, quest, period key) turns repeats into no-ops.
pub(crate) fn assign_for_user_in(
    conn: &Connection,
    user_id: &str,
    templates: &[QuestRow],
    now: DateTime<Utc>,
) -> Result<usize> {
    let today = now.date_naive();
    let mut assigned = 0;

    for quest in templates {
        let period: QuestPeriod = quest.period.parse()?;
        let expires_at = period_end(period, today).map(time::to_db);
        assigned += conn.execute(
            "INSERT OR IGNORE INTO user_quests (id, user_id, quest_id, period_key, assigned_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                Uuid::new_v4().to_string(),
                user_id,
                quest.id,
                period_key(period, today),
                time::to_db(now),
                expires_at,
            ],
        )?;
    }

    Ok(assigned)
}

/// Advance every live, unfinished instance whose template tracks `action`.
/// Completing an instance pays out its XP and coins.
pub(crate) fn record_quest_progress_in(
    conn: &Connection,
    user_id: &str,
    action: &str,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Vec<CompletedQuest>> {
    if amount <= 0 {
        return Err(EconomyError::InvalidAmount(amount).into());
    }
    require_user(conn, user_id)?;

    let templates = active_templates(conn)?;
    assign_for_user_in(conn, user_id, &templates, now)?;

    let sql = format!(
        "{USER_QUEST_SELECT}
         WHERE uq.user_id = ?1
           AND q.action = ?2
           AND q.active = 1
           AND uq.completed_at IS NULL
           AND (uq.expires_at IS NULL OR uq.expires_at > ?3)"
    );
    let mut stmt = conn.prepare(&sql)?;
    let open = stmt
        .query_map(rusqlite::params![user_id, action, time::to_db(now)], map_user_quest)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut completed = Vec::new();
    for quest in open {
        let progress = (quest.progress + amount).min(quest.target);
        let done = progress >= quest.target;
        let completed_at = done.then(|| time::to_db(now));

        conn.execute(
            "UPDATE user_quests SET progress = ?1, completed_at = ?2 WHERE id = ?3",
            rusqlite::params![progress, completed_at, quest.id],
        )?;
        debug!("Quest {} for {}: {}/{}", quest.slug, user_id, progress, quest.target);

        if !done {
            continue;
        }

        let label = format!("quest:{}", quest.slug);
        if quest.coin_reward > 0 {
            record_transaction_in(conn, user_id, quest.coin_reward, TransactionKind::Earned, &label, now)?;
        }
        if quest.xp_reward > 0 {
            award_xp_in(conn, user_id, quest.xp_reward, &label, now)?;
        }

        info!("User {} completed quest {}", user_id, quest.slug);
        completed.push(CompletedQuest {
            user_quest_id: quest.id.parse()?,
            slug: quest.slug,
            xp_reward: quest.xp_reward,
            coin_reward: quest.coin_reward,
        });
    }

    Ok(completed)
}

fn map_user_quest(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserQuestRow> {
    Ok(UserQuestRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        quest_id: row.get(2)?,
        slug: row.get(3)?,
        title: row.get(4)?,
        period: row.get(5)?,
        period_key: row.get(6)?,
        action: row.get(7)?,
        progress: row.get(8)?,
        target: row.get(9)?,
        xp_reward: row.get(10)?,
        coin_reward: row.get(11)?,
        expires_at: row.get(12)?,
        completed_at: row.get(13)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, coins, db, seed_user};

    fn count_instances(db: &Database, user_id: &str) -> i64 {
        db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM user_quests WHERE user_id = ?1", [user_id], |r| r.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn period_keys_and_ends() {
        // 2026-10-21 is a Wednesday in ISO week 43.
        let wed = NaiveDate::from_ymd_opt(2026, 10, 21).unwrap();
        assert_eq!(period_key(QuestPeriod::Daily, wed), "2026-10-21");
        assert_eq!(period_key(QuestPeriod::Weekly, wed), "2026-W43");
        assert_eq!(period_key(QuestPeriod::Special, wed), "special");

        assert_eq!(period_end(QuestPeriod::Daily, wed), Some(at(2026, 10, 22) - chrono::Duration::hours(12)));
        assert_eq!(period_end(QuestPeriod::Weekly, wed), Some(at(2026, 10, 26) - chrono::Duration::hours(12)));
        assert_eq!(period_end(QuestPeriod::Special, wed), None);
    }

    #[test]
    fn sunday_week_ends_next_midnight() {
        let sun = NaiveDate::from_ymd_opt(2026, 10, 25).unwrap();
        assert_eq!(period_end(QuestPeriod::Weekly, sun), Some(at(2026, 10, 26) - chrono::Duration::hours(12)));
    }

    #[test]
    fn assignment_is_idempotent_per_period() {
        let db = db();
        let a = seed_user(&db, "quinn");
        let b = seed_user(&db, "rosa");

        let templates = 7;
        assert_eq!(db.assign_quests(at(2026, 10, 21)).unwrap(), 2 * templates);
        assert_eq!(db.assign_quests(at(2026, 10, 21)).unwrap(), 0);
        assert_eq!(count_instances(&db, &a), templates as i64);

        // Next day: only the three daily templates are new.
        assert_eq!(db.assign_quests(at(2026, 10, 22)).unwrap(), 2 * 3);
        assert_eq!(count_instances(&db, &b), templates as i64 + 3);
    }

    #[test]
    fn progress_completes_and_pays_once() {
        let db = db();
        let id = seed_user(&db, "sam");
        let now = at(2026, 10, 21);

        let done = db.record_quest_progress(&id, "log_meal", 2, now).unwrap();
        assert!(done.is_empty());
        let done = db.record_quest_progress(&id, "log_meal", 5, now).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].slug, "daily-meals");
        assert_eq!(coins(&db, &id), 5);

        let again = db.record_quest_progress(&id, "log_meal", 1, now).unwrap();
        assert!(again.is_empty());
        assert_eq!(coins(&db, &id), 5);

        let meals = db
            .user_quests(&id, now)
            .unwrap()
            .into_iter()
            .find(|q| q.slug == "daily-meals")
            .unwrap();
        assert_eq!(meals.progress, meals.target);
        assert!(meals.completed_at.is_some());
    }

    #[test]
    fn one_action_can_advance_daily_and_weekly() {
        let db = db();
        let id = seed_user(&db, "tina");

        let done = db.record_quest_progress(&id, "log_weight", 1, at(2026, 10, 19)).unwrap();
        let slugs: Vec<&str> = done.iter().map(|q| q.slug.as_str()).collect();
        assert_eq!(slugs, vec!["daily-weigh-in"]);

        for day in 20..=23 {
            db.record_quest_progress(&id, "log_weight", 1, at(2026, 10, day)).unwrap();
        }
        let weekly = db
            .user_quests(&id, at(2026, 10, 23))
            .unwrap()
            .into_iter()
            .find(|q| q.slug == "weekly-weigh-ins")
            .unwrap();
        assert_eq!(weekly.progress, 5);
        assert!(weekly.completed_at.is_some());
    }

    #[test]
    fn cleanup_keeps_completed_history() {
        let db = db();
        let id = seed_user(&db, "uma");
        let monday = at(2026, 10, 19);

        db.assign_quests(monday).unwrap();
        db.record_quest_progress(&id, "log_mood", 1, monday).unwrap();

        // A week later every daily and weekly instance from Monday has expired.
        let removed = db.cleanup_expired_quests(at(2026, 10, 27)).unwrap();
        assert_eq!(removed, 4);
        // Specials plus the completed mood check remain.
        assert_eq!(count_instances(&db, &id), 3);
    }

    #[test]
    fn rejects_bad_input() {
        let db = db();
        let id = seed_user(&db, "vic");
        let err = db.record_quest_progress(&id, "log_meal", 0, at(2026, 10, 21)).unwrap_err();
        assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::InvalidAmount(0)));

        let err = db.record_quest_progress("ghost", "log_meal", 1, at(2026, 10, 21)).unwrap_err();
        assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::UserNotFound));
    }
}
