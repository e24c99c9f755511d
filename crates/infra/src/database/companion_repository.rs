//! SQLite-backed implementation of the CompanionRepository port.

use std::sync::Arc;

use amity_core::companion_ports::CompanionRepository;
use amity_domain::{CompanionProfile, Result};
use async_trait::async_trait;
use rusqlite::params;
use uuid::Uuid;

use super::appointment_repository::parse_uuid;
use super::manager::DbManager;
use crate::errors::db_err;

/// SQLite implementation of CompanionRepository
pub struct SqliteCompanionRepository {
    db: Arc<DbManager>,
}

impl SqliteCompanionRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CompanionRepository for SqliteCompanionRepository {
    async fn get(&self, companion_id: Uuid) -> Result<Option<CompanionProfile>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            "SELECT id, owner_user_id, display_name, timezone, calendar_id
             FROM companions WHERE id = ?1",
            params![companion_id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        );

        match result {
            Ok((id, owner, display_name, timezone, calendar_id)) => Ok(Some(CompanionProfile {
                id: parse_uuid(&id)?,
                owner_user_id: parse_uuid(&owner)?,
                display_name,
                timezone,
                calendar_id,
            })),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(db_err(err)),
        }
    }

    async fn insert(&self, profile: &CompanionProfile) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT INTO companions (id, owner_user_id, display_name, timezone, calendar_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                profile.id.to_string(),
                profile.owner_user_id.to_string(),
                profile.display_name,
                profile.timezone,
                profile.calendar_id
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    async fn list_connected_ids(&self) -> Result<Vec<Uuid>> {
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT c.id FROM companions c
                 JOIN calendar_credentials cc ON cc.companion_id = c.id
                 ORDER BY c.id",
            )
            .map_err(db_err)?;

        let rows = stmt.query_map(params![], |row| row.get::<_, String>(0)).map_err(db_err)?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(parse_uuid(&row.map_err(db_err)?)?);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use amity_core::credentials::ports::CredentialStore;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use super::*;
    use crate::database::credential_repository::SqliteCredentialStore;

    fn setup() -> (SqliteCompanionRepository, SqliteCredentialStore, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = Arc::new(
            DbManager::new(temp_dir.path().join("amity.db"), 2).expect("manager created"),
        );
        db.run_migrations().expect("migrations run");
        (
            SqliteCompanionRepository::new(db.clone()),
            SqliteCredentialStore::new(db),
            temp_dir,
        )
    }

    fn profile() -> CompanionProfile {
        CompanionProfile {
            id: Uuid::new_v4(),
            owner_user_id: Uuid::new_v4(),
            display_name: "Asha".into(),
            timezone: "Europe/Berlin".into(),
            calendar_id: "primary".into(),
        }
    }

    #[tokio::test]
    async fn insert_and_get_round_trip() {
        let (repo, _credentials, _guard) = setup();
        let companion = profile();

        repo.insert(&companion).await.expect("inserted");

        let fetched = repo.get(companion.id).await.expect("queried").expect("present");
        assert_eq!(fetched.owner_user_id, companion.owner_user_id);
        assert_eq!(fetched.timezone, "Europe/Berlin");
    }

    #[tokio::test]
    async fn only_connected_companions_are_listed() {
        let (repo, credentials, _guard) = setup();
        let connected = profile();
        let disconnected = profile();

        repo.insert(&connected).await.expect("inserted");
        repo.insert(&disconnected).await.expect("inserted");

        credentials
            .upsert(&amity_domain::CalendarCredential {
                companion_id: connected.id,
                access_token: "a".into(),
                refresh_token: "r".into(),
                expires_at: Utc
                    .with_ymd_and_hms(2025, 6, 2, 10, 0, 0)
                    .single()
                    .expect("valid time"),
                scopes: vec![],
            })
            .await
            .expect("credential stored");

        let ids = repo.list_connected_ids().await.expect("listed");
        assert_eq!(ids, vec![connected.id]);
    }
}
