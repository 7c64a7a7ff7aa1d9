use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use slimquest_types::models::TransactionKind;

use crate::coins::record_transaction_in;
use crate::error::EconomyError;
use crate::models::{PurchaseRow, RewardRow};
use crate::queries::{OptionalExt, require_user};
use crate::{Database, time};

const PURCHASE_SELECT: &str = "
    SELECT ur.id, ur.user_id, ur.reward_id, r.name, ur.coins_paid, ur.purchased_at, ur.used, ur.used_at
    FROM user_rewards ur
    JOIN rewards r ON r.id = ur.reward_id";

impl Database {
    /// Rewards currently on sale.
    pub fn list_rewards(&self) -> Result<Vec<RewardRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slug, name, description, price, stock, active
                 FROM rewards WHERE active = 1 ORDER BY price, slug",
            )?;
            let rows = stmt
                .query_map([], map_reward)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_reward(&self, reward_id: &str) -> Result<Option<RewardRow>> {
        self.with_conn(|conn| query_reward(conn, reward_id))
    }

    /// Checks, stock decrement, debit and purchase row all commit together or not at all.
    pub fn purchase_reward(&self, user_id: &str, reward_id: &str, now: DateTime<Utc>) -> Result<PurchaseRow> {
        self.transaction(|conn| {
            let user = require_user(conn, user_id)?;
            let reward = query_reward(conn, reward_id)?.ok_or(EconomyError::NotFound("reward"))?;

            if !reward.active {
                return Err(EconomyError::RewardInactive.into());
            }
            if reward.stock == Some(0) {
                return Err(EconomyError::OutOfStock.into());
            }
            if user.coins < reward.price {
                return Err(EconomyError::InsufficientCoins {
                    needed: reward.price,
                    available: user.coins,
                }
                .into());
            }

            if reward.stock.is_some() {
                let updated = conn.execute(
                    "UPDATE rewards SET stock = stock - 1 WHERE id = ?1 AND stock > 0",
                    [reward_id],
                )?;
                if updated == 0 {
                    return Err(EconomyError::OutOfStock.into());
                }
            }

            if reward.price > 0 {
                let label = format!("purchase:{}", reward.slug);
                record_transaction_in(conn, user_id, -reward.price, TransactionKind::Spent, &label, now)?;
            }

            let purchase_id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO user_rewards (id, user_id, reward_id, coins_paid, purchased_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![purchase_id, user_id, reward_id, reward.price, time::to_db(now)],
            )?;

            info!("User {} bought {} for {} coins", user_id, reward.slug, reward.price);
            require_purchase(conn, &purchase_id)
        })
    }

    /// Mark a purchase as redeemed. Each purchase can be used once.
    pub fn use_purchase(&self, user_id: &str, purchase_id: &str, now: DateTime<Utc>) -> Result<PurchaseRow> {
        self.transaction(|conn| {
            let purchase = owned_purchase(conn, user_id, purchase_id)?;
            if purchase.used {
                return Err(EconomyError::AlreadyUsed.into());
            }

            conn.execute(
                "UPDATE user_rewards SET used = 1, used_at = ?1 WHERE id = ?2 AND used = 0",
                rusqlite::params![time::to_db(now), purchase_id],
            )?;
            require_purchase(conn, purchase_id)
        })
    }

    /// Return an unused purchase: stock goes back on the shelf and the price
    /// is credited as a refund. Returns (refunded, new balance).
    pub fn refund_purchase(&self, user_id: &str, purchase_id: &str, now: DateTime<Utc>) -> Result<(i64, i64)> {
        self.transaction(|conn| {
            let purchase = owned_purchase(conn, user_id, purchase_id)?;
            if purchase.used {
                return Err(EconomyError::AlreadyUsed.into());
            }

            conn.execute("DELETE FROM user_rewards WHERE id = ?1", [purchase_id])?;
            conn.execute(
                "UPDATE rewards SET stock = stock + 1 WHERE id = ?1 AND stock IS NOT NULL",
                [&purchase.reward_id],
            )?;

            let balance = if purchase.coins_paid > 0 {
                let label = format!("refund:{}", purchase.reward_name);
                record_transaction_in(conn, user_id, purchase.coins_paid, TransactionKind::Refund, &label, now)?
            } else {
                require_user(conn, user_id)?.coins
            };

            info!("User {} refunded purchase {}", user_id, purchase_id);
            Ok((purchase.coins_paid, balance))
        })
    }

    /// Newest first.
    pub fn user_purchases(&self, user_id: &str) -> Result<Vec<PurchaseRow>> {
        self.with_conn(|conn| {
            let sql = format!("{PURCHASE_SELECT} WHERE ur.user_id = ?1 ORDER BY ur.purchased_at DESC, ur.rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], map_purchase)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_reward(conn: &Connection, reward_id: &str) -> Result<Option<RewardRow>> {
    conn.query_row(
        "SELECT id, slug, name, description, price, stock, active FROM rewards WHERE id = ?1",
        [reward_id],
        map_reward,
    )
    .optional()
}

fn require_purchase(conn: &Connection, purchase_id: &str) -> Result<PurchaseRow> {
    let sql = format!("{PURCHASE_SELECT} WHERE ur.id = ?1");
    conn.query_row(&sql, [purchase_id], map_purchase)
        .optional()?
        .ok_or_else(|| EconomyError::NotFound("purchase").into())
}

fn owned_purchase(conn: &Connection, user_id: &str, purchase_id: &str) -> Result<PurchaseRow> {
    let purchase = require_purchase(conn, purchase_id)?;
    if purchase.user_id != user_id {
        return Err(EconomyError::NotOwner.into());
    }
    Ok(purchase)
}

fn map_reward(row: &rusqlite::Row<'_>) -> rusqlite::Result<RewardRow> {
    Ok(RewardRow {
        id: row.get(0)?,
        slug: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        price: row.get(4)?,
        stock: row.get(5)?,
        active: row.get(6)?,
    })
}

fn map_purchase(row: &rusqlite::Row<'_>) -> rusqlite::Result<PurchaseRow> {
    Ok(PurchaseRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        reward_id: row.get(2)?,
        reward_name: row.get(3)?,
        coins_paid: row.get(4)?,
        purchased_at: row.get(5)?,
        used: row.get(6)?,
        used_at: row.get(7)?,
    })
}
