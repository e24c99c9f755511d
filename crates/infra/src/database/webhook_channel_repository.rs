//! SQLite-backed implementation of the WebhookChannelRepository port.
//!
//! The explicit keyed registry mapping provider channel ids to companions.

use std::sync::Arc;

use amity_core::webhook_ports::WebhookChannelRepository;
use amity_domain::{Result, WebhookChannel};
use async_trait::async_trait;
use rusqlite::{params, Row};
use uuid::Uuid;

use super::appointment_repository::{parse_ts, parse_uuid};
use super::manager::DbManager;
use crate::errors::db_err;

/// SQLite implementation of WebhookChannelRepository
pub struct SqliteWebhookChannelRepository {
    db: Arc<DbManager>,
}

impl SqliteWebhookChannelRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

const SELECT_COLUMNS: &str =
    "companion_id, channel_id, resource_id, validation_token, expires_at";

#[async_trait]
impl WebhookChannelRepository for SqliteWebhookChannelRepository {
    async fn find_by_channel_id(&self, channel_id: &str) -> Result<Option<WebhookChannel>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM webhook_channels WHERE channel_id = ?1"),
            params![channel_id],
            row_to_channel,
        );

        match result {
            Ok(channel) => Ok(Some(channel?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(db_err(err)),
        }
    }

    async fn find_by_companion(&self, companion_id: Uuid) -> Result<Option<WebhookChannel>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            &format!("SELECT {SELECT_COLUMNS} FROM webhook_channels WHERE companion_id = ?1"),
            params![companion_id.to_string()],
            row_to_channel,
        );

        match result {
            Ok(channel) => Ok(Some(channel?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(db_err(err)),
        }
    }

    async fn replace_for_companion(&self, channel: &WebhookChannel) -> Result<()> {
        let conn = self.db.conn()?;
        // One active channel per companion: the primary key makes a new
        // registration invalidate the previous record.
        conn.execute(
            "INSERT OR REPLACE INTO webhook_channels
                (companion_id, channel_id, resource_id, validation_token, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                channel.companion_id.to_string(),
                channel.channel_id,
                channel.resource_id,
                channel.validation_token,
                channel.expires_at.timestamp()
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete_for_companion(&self, companion_id: Uuid) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "DELETE FROM webhook_channels WHERE companion_id = ?1",
            params![companion_id.to_string()],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

fn row_to_channel(row: &Row<'_>) -> rusqlite::Result<Result<WebhookChannel>> {
    let companion_id: String = row.get(0)?;
    let channel_id: String = row.get(1)?;
    let resource_id: Option<String> = row.get(2)?;
    let validation_token: String = row.get(3)?;
    let expires_at: i64 = row.get(4)?;

    Ok((|| {
        Ok(WebhookChannel {
            companion_id: parse_uuid(&companion_id)?,
            channel_id,
            resource_id,
            validation_token,
            expires_at: parse_ts(expires_at)?,
        })
    })())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;

    fn repository() -> (SqliteWebhookChannelRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = Arc::new(
            DbManager::new(temp_dir.path().join("amity.db"), 2).expect("manager created"),
        );
        db.run_migrations().expect("migrations run");
        (SqliteWebhookChannelRepository::new(db), temp_dir)
    }

    fn channel(companion_id: Uuid, channel_id: &str) -> WebhookChannel {
        WebhookChannel {
            companion_id,
            channel_id: channel_id.to_string(),
            resource_id: Some("resource-1".into()),
            validation_token: "tok".into(),
            expires_at: Utc.with_ymd_and_hms(2025, 6, 9, 0, 0, 0).single().expect("valid time"),
        }
    }

    #[tokio::test]
    async fn registration_replaces_previous_channel() {
        let (repo, _guard) = repository();
        let companion_id = Uuid::new_v4();

        repo.replace_for_companion(&channel(companion_id, "chan-a")).await.expect("first");
        repo.replace_for_companion(&channel(companion_id, "chan-b")).await.expect("second");

        // The old channel id no longer resolves
        assert!(repo.find_by_channel_id("chan-a").await.expect("queried").is_none());

        let active = repo
            .find_by_companion(companion_id)
            .await
            .expect("queried")
            .expect("channel present");
        assert_eq!(active.channel_id, "chan-b");
    }

    #[tokio::test]
    async fn channel_id_lookup_joins_back_to_companion() {
        let (repo, _guard) = repository();
        let companion_id = Uuid::new_v4();

        repo.replace_for_companion(&channel(companion_id, "chan-x")).await.expect("stored");

        let found = repo
            .find_by_channel_id("chan-x")
            .await
            .expect("queried")
            .expect("channel present");
        assert_eq!(found.companion_id, companion_id);
        assert_eq!(found.validation_token, "tok");
    }

    #[tokio::test]
    async fn delete_removes_registration() {
        let (repo, _guard) = repository();
        let companion_id = Uuid::new_v4();

        repo.replace_for_companion(&channel(companion_id, "chan-y")).await.expect("stored");
        repo.delete_for_companion(companion_id).await.expect("deleted");

        assert!(repo.find_by_companion(companion_id).await.expect("queried").is_none());
    }
}
