//! SQLite-backed implementation of the CredentialStore port.

use std::sync::Arc;

use amity_core::credentials::ports::CredentialStore;
use amity_domain::{CalendarCredential, Result};
use async_trait::async_trait;
use rusqlite::params;
use uuid::Uuid;

use super::appointment_repository::{parse_ts, parse_uuid};
use super::manager::DbManager;
use crate::errors::db_err;

/// SQLite implementation of CredentialStore
pub struct SqliteCredentialStore {
    db: Arc<DbManager>,
}

impl SqliteCredentialStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn load(&self, companion_id: Uuid) -> Result<Option<CalendarCredential>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            "SELECT companion_id, access_token, refresh_token, expires_at, scopes
             FROM calendar_credentials WHERE companion_id = ?1",
            params![companion_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        );

        match result {
            Ok((companion, access_token, refresh_token, expires_at, scopes)) => {
                Ok(Some(CalendarCredential {
                    companion_id: parse_uuid(&companion)?,
                    access_token,
                    refresh_token,
                    expires_at: parse_ts(expires_at)?,
                    scopes: split_scopes(&scopes),
                }))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(db_err(err)),
        }
    }

    async fn upsert(&self, credential: &CalendarCredential) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO calendar_credentials (companion_id, access_token, refresh_token, expires_at, scopes)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(companion_id) DO UPDATE SET
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                scopes = excluded.scopes",
            params![
                credential.companion_id.to_string(),
                credential.access_token,
                credential.refresh_token,
                credential.expires_at.timestamp(),
                credential.scopes.join(" ")
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, companion_id: Uuid) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "DELETE FROM calendar_credentials WHERE companion_id = ?1",
            params![companion_id.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

fn split_scopes(scopes: &str) -> Vec<String> {
    scopes.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn store() -> (SqliteCredentialStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = Arc::new(
            DbManager::new(temp_dir.path().join("amity.db"), 2).expect("manager created"),
        );
        db.run_migrations().expect("migrations run");
        (SqliteCredentialStore::new(db), temp_dir)
    }

    fn credential(companion_id: Uuid) -> CalendarCredential {
        CalendarCredential {
            companion_id,
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at: Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).single().expect("valid time"),
            scopes: vec!["calendar.readonly".into(), "openid".into()],
        }
    }

    #[tokio::test]
    async fn upsert_is_idempotent_and_replaces() {
        let (store, _guard) = store();
        let companion_id = Uuid::new_v4();

        store.upsert(&credential(companion_id)).await.expect("first upsert");

        let mut updated = credential(companion_id);
        updated.access_token = "rotated".into();
        store.upsert(&updated).await.expect("second upsert");

        let loaded = store.load(companion_id).await.expect("loaded").expect("present");
        assert_eq!(loaded.access_token, "rotated");
        assert_eq!(loaded.scopes, vec!["calendar.readonly".to_string(), "openid".to_string()]);
    }

    #[tokio::test]
    async fn delete_clears_the_row() {
        let (store, _guard) = store();
        let companion_id = Uuid::new_v4();

        store.upsert(&credential(companion_id)).await.expect("upserted");
        store.delete(companion_id).await.expect("deleted");

        assert!(store.load(companion_id).await.expect("loaded").is_none());
    }
}
