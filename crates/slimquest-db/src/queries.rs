use crate::error::EconomyError;
use crate::models::{LeaderboardRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, ErrorCode, Row};

const USER_COLUMNS: &str =
    "id, username, password, xp, level, streak, longest_streak, last_active, coins, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            ) {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                    Err(EconomyError::UsernameTaken.into())
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1");
            conn.query_row(&sql, [username], map_user).optional()
        })
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    // -- Leaderboard --

    /// Top users by XP; earlier accounts win ties.
    pub fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, username, xp, level FROM users
                 ORDER BY xp DESC, created_at ASC, rowid ASC
                 LIMIT ?1",
            )?;

            let rows = stmt
                .query_map([limit], |row| {
                    Ok(LeaderboardRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        xp: row.get(2)?,
                        level: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

pub(crate) fn query_user(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    conn.query_row(&sql, [id], map_user).optional()
}

/// Like [`query_user`] but a missing user is a business error.
pub(crate) fn require_user(conn: &Connection, id: &str) -> Result<UserRow> {
    query_user(conn, id)?.ok_or_else(|| EconomyError::UserNotFound.into())
}

pub(crate) fn all_user_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM users ORDER BY rowid")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        xp: row.get(3)?,
        level: row.get(4)?,
        streak: row.get(5)?,
        longest_streak: row.get(6)?,
        last_active: row.get(7)?,
        coins: row.get(8)?,
        created_at: row.get(9)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::EconomyError;
    use crate::testing::{db, seed_user};

    #[test]
    fn duplicate_username_is_rejected() {
        let db = db();
        seed_user(&db, "alice");
        let err = db.create_user("another-id", "alice", "hash").unwrap_err();
        assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::UsernameTaken));
        assert!(db.get_user_by_id("another-id").unwrap().is_none());
    }

    #[test]
    fn new_users_start_at_level_one() {
        let db = db();
        let id = seed_user(&db, "bob");
        let user = db.get_user_by_id(&id).unwrap().unwrap();
        assert_eq!(user.level, 1);
        assert_eq!(user.xp, 0);
        assert_eq!(user.coins, 0);
        assert!(user.last_active.is_none());
        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn leaderboard_orders_by_xp_then_age() {
        let db = db();
        let first = seed_user(&db, "first");
        let second = seed_user(&db, "second");
        let third = seed_user(&db, "third");
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET xp = 50 WHERE id = ?1", [&first])?;
            conn.execute("UPDATE users SET xp = 50 WHERE id = ?1", [&second])?;
            conn.execute("UPDATE users SET xp = 90 WHERE id = ?1", [&third])?;
            Ok(())
        })
        .unwrap();

        let board = db.leaderboard(10).unwrap();
        let order: Vec<&str> = board.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(order, vec![third.as_str(), first.as_str(), second.as_str()]);

        assert_eq!(db.leaderboard(1).unwrap().len(), 1);
    }
}
