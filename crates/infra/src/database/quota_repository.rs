//! SQLite-backed implementation of the QuotaRepository port.
//!
//! The reserve operation is a single conditional UPDATE, so the
//! check-and-increment is atomic with respect to concurrent reservations
//! for the same user.

use std::sync::Arc;

use amity_core::billing::ports::QuotaRepository;
use amity_domain::{PlanType, Result, SubscriptionQuota};
use async_trait::async_trait;
use rusqlite::params;
use uuid::Uuid;

use super::appointment_repository::parse_uuid;
use super::manager::DbManager;
use crate::errors::db_err;

/// SQLite implementation of QuotaRepository
pub struct SqliteQuotaRepository {
    db: Arc<DbManager>,
}

impl SqliteQuotaRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl QuotaRepository for SqliteQuotaRepository {
    async fn get(&self, user_id: Uuid) -> Result<Option<SubscriptionQuota>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            "SELECT user_id, plan, interactions_allowed, interactions_used
             FROM subscription_quotas WHERE user_id = ?1",
            params![user_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<u32>>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            },
        );

        match result {
            Ok((user, plan, interactions_allowed, interactions_used)) => {
                Ok(Some(SubscriptionQuota {
                    user_id: parse_uuid(&user)?,
                    plan: plan.parse()?,
                    interactions_allowed,
                    interactions_used,
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(db_err(err)),
        }
    }

    async fn try_reserve(&self, user_id: Uuid) -> Result<bool> {
        let conn = self.db.conn()?;
        let updated = conn
            .execute(
                "UPDATE subscription_quotas
                 SET interactions_used = interactions_used + 1
                 WHERE user_id = ?1
                   AND (interactions_allowed IS NULL
                        OR interactions_used < interactions_allowed)",
                params![user_id.to_string()],
            )
            .map_err(db_err)?;
        Ok(updated == 1)
    }

    async fn release(&self, user_id: Uuid) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "UPDATE subscription_quotas
             SET interactions_used = MAX(interactions_used - 1, 0)
             WHERE user_id = ?1",
            params![user_id.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn ensure_plan(&self, user_id: Uuid, plan: PlanType) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO subscription_quotas
                (user_id, plan, interactions_allowed, interactions_used)
             VALUES (?1, ?2, ?3, 0)",
            params![user_id.to_string(), plan.as_str(), plan.interactions_allowed()],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn set_plan(&self, user_id: Uuid, plan: PlanType) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO subscription_quotas
                (user_id, plan, interactions_allowed, interactions_used)
             VALUES (?1, ?2, ?3, 0)
             ON CONFLICT(user_id) DO UPDATE SET
                plan = excluded.plan,
                interactions_allowed = excluded.interactions_allowed",
            params![user_id.to_string(), plan.as_str(), plan.interactions_allowed()],
        )
        .map_err(db_err)?;
        Ok(())
    }
}
