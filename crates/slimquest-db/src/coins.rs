use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::{debug, warn};
use uuid::Uuid;

use slimquest_types::models::TransactionKind;

use crate::error::EconomyError;
use crate::models::CoinTransactionRow;
use crate::queries::require_user;
use crate::{Database, time};

impl Database {
    /// Append a ledger entry and move the cached balance with it.
    /// Returns the new balance.
    pub fn record_coin_transaction(
        &self,
        user_id: &str,
        amount: i64,
        kind: TransactionKind,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        self.transaction(|conn| record_transaction_in(conn, user_id, amount, kind, description, now))
    }

    /// Newest first.
    pub fn coin_transactions(&self, user_id: &str, limit: u32) -> Result<Vec<CoinTransactionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, amount, kind, description, created_at FROM coin_transactions
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![user_id, limit], |row| {
                    Ok(CoinTransactionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        amount: row.get(2)?,
                        kind: row.get(3)?,
                        description: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Recompute the cached balance from the ledger. Returns the corrected balance.
    pub fn reconcile_balance(&self, user_id: &str) -> Result<i64> {
        self.transaction(|conn| {
            let user = require_user(conn, user_id)?;
            let sum = ledger_sum(conn, user_id)?;
            if sum != user.coins {
                warn!("Balance drift for user {}: cached {}, ledger {}", user_id, user.coins, sum);
                conn.execute("UPDATE users SET coins = ?1 WHERE id = ?2", rusqlite::params![sum, user_id])?;
            }
            Ok(sum)
        })
    }
}

pub(crate) fn record_transaction_in(
    conn: &Connection,
    user_id: &str,
    amount: i64,
    kind: TransactionKind,
    description: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    if !kind.accepts(amount) {
        return Err(EconomyError::InvalidAmount(amount).into());
    }

    let user = require_user(conn, user_id)?;
    let balance = user.coins + amount;
    if balance < 0 {
        return Err(EconomyError::InsufficientCoins {
            needed: -amount,
            available: user.coins,
        }
        .into());
    }

    conn.execute("UPDATE users SET coins = ?1 WHERE id = ?2", rusqlite::params![balance, user_id])?;
    conn.execute(
        "INSERT INTO coin_transactions (id, user_id, amount, kind, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            user_id,
            amount,
            kind.as_str(),
            description,
            time::to_db(now),
        ],
    )?;

    debug!("Ledger {} {:+} ({}) -> {}", user_id, amount, kind.as_str(), balance);
    Ok(balance)
}

fn ledger_sum(conn: &Connection, user_id: &str) -> Result<i64> {
    let sum = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM coin_transactions WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )?;
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, coins, db, seed_user};

    #[test]
    fn balance_follows_ledger() {
        let db = db();
        let id = seed_user(&db, "erin");
        let now = at(2026, 2, 1);

        assert_eq!(db.record_coin_transaction(&id, 40, TransactionKind::Earned, "quest", now).unwrap(), 40);
        assert_eq!(db.record_coin_transaction(&id, 15, TransactionKind::Bonus, "streak", now).unwrap(), 55);
        assert_eq!(db.record_coin_transaction(&id, -30, TransactionKind::Spent, "shop", now).unwrap(), 25);
        assert_eq!(db.record_coin_transaction(&id, 30, TransactionKind::Refund, "shop", now).unwrap(), 55);

        assert_eq!(coins(&db, &id), 55);
        assert_eq!(db.reconcile_balance(&id).unwrap(), 55);

        let history = db.coin_transactions(&id, 10).unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history.iter().map(|t| t.amount).sum::<i64>(), 55);
    }

    #[test]
    fn overdraft_is_rejected_without_side_effects() {
        let db = db();
        let id = seed_user(&db, "frank");
        let now = at(2026, 2, 1);
        db.record_coin_transaction(&id, 10, TransactionKind::Earned, "quest", now).unwrap();

        let err = db.record_coin_transaction(&id, -11, TransactionKind::Spent, "shop", now).unwrap_err();
        assert_eq!(
            err.downcast_ref::<EconomyError>(),
            Some(&EconomyError::InsufficientCoins { needed: 11, available: 10 })
        );
        assert_eq!(coins(&db, &id), 10);
        assert_eq!(db.coin_transactions(&id, 10).unwrap().len(), 1);
    }

    #[test]
    fn sign_must_match_kind() {
        let db = db();
        let id = seed_user(&db, "gina");
        let now = at(2026, 2, 1);

        for (amount, kind) in [
            (5, TransactionKind::Spent),
            (-5, TransactionKind::Earned),
            (0, TransactionKind::Bonus),
            (-1, TransactionKind::Refund),
        ] {
            let err = db.record_coin_transaction(&id, amount, kind, "bad", now).unwrap_err();
            assert_eq!(err.downcast_ref::<EconomyError>(), Some(&EconomyError::InvalidAmount(amount)));
        }
    }

    #[test]
    fn reconcile_repairs_drift() {
        let db = db();
        let id = seed_user(&db, "hank");
        db.record_coin_transaction(&id, 20, TransactionKind::Earned, "quest", at(2026, 2, 1)).unwrap();
        db.with_conn(|conn| {
            conn.execute("UPDATE users SET coins = 999 WHERE id = ?1", [&id])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.reconcile_balance(&id).unwrap(), 20);
        assert_eq!(coins(&db, &id), 20);
    }
}
