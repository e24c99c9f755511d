//! SQLite-backed implementation of the WorkingHoursRepository port.

use std::sync::Arc;

use amity_core::availability::ports::WorkingHoursRepository;
use amity_domain::{AmityError, Result, WorkingHoursRule};
use async_trait::async_trait;
use chrono::{NaiveTime, Timelike, Weekday};
use rusqlite::params;
use uuid::Uuid;

use super::appointment_repository::parse_uuid;
use super::manager::DbManager;
use crate::errors::db_err;

/// SQLite implementation of WorkingHoursRepository
pub struct SqliteWorkingHoursRepository {
    db: Arc<DbManager>,
}

impl SqliteWorkingHoursRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl WorkingHoursRepository for SqliteWorkingHoursRepository {
    async fn rules_for_weekday(
        &self,
        companion_id: Uuid,
        weekday: Weekday,
    ) -> Result<Vec<WorkingHoursRule>> {
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT companion_id, weekday, start_minutes, end_minutes, timezone
                 FROM working_hours_rules
                 WHERE companion_id = ?1 AND weekday = ?2
                 ORDER BY start_minutes",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(
                params![companion_id.to_string(), weekday.num_days_from_monday()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, u8>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .map_err(db_err)?;

        let mut rules = Vec::new();
        for row in rows {
            let (companion, weekday_idx, start_minutes, end_minutes, timezone) =
                row.map_err(db_err)?;
            rules.push(WorkingHoursRule {
                companion_id: parse_uuid(&companion)?,
                weekday: weekday_from_index(weekday_idx)?,
                start: time_from_minutes(start_minutes)?,
                end: time_from_minutes(end_minutes)?,
                timezone,
            });
        }
        Ok(rules)
    }

    async fn upsert_rule(&self, rule: &WorkingHoursRule) -> Result<()> {
        let conn = self.db.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO working_hours_rules
                (companion_id, weekday, start_minutes, end_minutes, timezone)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                rule.companion_id.to_string(),
                rule.weekday.num_days_from_monday(),
                minutes_of_day(rule.start),
                minutes_of_day(rule.end),
                rule.timezone
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

fn minutes_of_day(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

fn time_from_minutes(minutes: i64) -> Result<NaiveTime> {
    let hour = u32::try_from(minutes / 60)
        .map_err(|_| AmityError::Database(format!("invalid minutes value {minutes}")))?;
    let minute = u32::try_from(minutes % 60)
        .map_err(|_| AmityError::Database(format!("invalid minutes value {minutes}")))?;
    NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| AmityError::Database(format!("invalid minutes value {minutes}")))
}

fn weekday_from_index(index: u8) -> Result<Weekday> {
    let weekday = match index {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        6 => Weekday::Sun,
        other => {
            return Err(AmityError::Database(format!("invalid weekday index {other}")));
        }
    };
    Ok(weekday)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn repository() -> (SqliteWorkingHoursRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir created");
        let db = Arc::new(
            DbManager::new(temp_dir.path().join("amity.db"), 2).expect("manager created"),
        );
        db.run_migrations().expect("migrations run");
        (SqliteWorkingHoursRepository::new(db), temp_dir)
    }

    fn rule(companion_id: Uuid, weekday: Weekday, start_h: u32, end_h: u32) -> WorkingHoursRule {
        WorkingHoursRule {
            companion_id,
            weekday,
            start: NaiveTime::from_hms_opt(start_h, 0, 0).expect("valid time"),
            end: NaiveTime::from_hms_opt(end_h, 0, 0).expect("valid time"),
            timezone: "Europe/Berlin".into(),
        }
    }

    #[tokio::test]
    async fn rules_round_trip_per_weekday() {
        let (repo, _guard) = repository();
        let companion_id = Uuid::new_v4();

        repo.upsert_rule(&rule(companion_id, Weekday::Mon, 9, 12)).await.expect("upserted");
        repo.upsert_rule(&rule(companion_id, Weekday::Mon, 14, 18)).await.expect("upserted");
        repo.upsert_rule(&rule(companion_id, Weekday::Tue, 9, 12)).await.expect("upserted");

        let monday = repo
            .rules_for_weekday(companion_id, Weekday::Mon)
            .await
            .expect("queried");

        assert_eq!(monday.len(), 2);
        assert_eq!(monday[0].start, NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"));
        assert_eq!(monday[1].start, NaiveTime::from_hms_opt(14, 0, 0).expect("valid time"));
        assert!(monday.iter().all(|r| r.timezone == "Europe/Berlin"));
    }

    #[tokio::test]
    async fn duplicate_upsert_is_idempotent() {
        let (repo, _guard) = repository();
        let companion_id = Uuid::new_v4();

        repo.upsert_rule(&rule(companion_id, Weekday::Fri, 10, 16)).await.expect("first");
        repo.upsert_rule(&rule(companion_id, Weekday::Fri, 10, 16)).await.expect("second");

        let friday =
            repo.rules_for_weekday(companion_id, Weekday::Fri).await.expect("queried");
        assert_eq!(friday.len(), 1);
    }
}
