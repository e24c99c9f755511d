//! SQLite-backed implementation of the AppointmentRepository port.
//!
//! Owns the overlap invariant: the availability check and the insert run
//! inside one immediate transaction, so no two pending/confirmed
//! appointments can ever overlap for a companion.

use std::sync::Arc;

use amity_core::booking::ports::AppointmentRepository;
use amity_domain::{
    AmityError, Appointment, AppointmentState, ConflictKind, Result,
};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Row, TransactionBehavior};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::manager::DbManager;
use crate::errors::db_err;

/// SQLite implementation of AppointmentRepository
pub struct SqliteAppointmentRepository {
    db: Arc<DbManager>,
}

impl SqliteAppointmentRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl AppointmentRepository for SqliteAppointmentRepository {
    #[instrument(skip(self, appointment), fields(appointment_id = %appointment.id))]
    async fn insert_pending_if_free(&self, appointment: &Appointment) -> Result<()> {
        let mut conn = self.db.conn()?;
        // Immediate transaction: the overlap check and the insert are one
        // atomic unit with respect to concurrent booking commits.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(db_err)?;

        let overlapping: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM appointments
                 WHERE companion_id = ?1
                   AND state IN ('pending', 'confirmed')
                   AND start_ts < ?3 AND end_ts > ?2",
                params![
                    appointment.companion_id.to_string(),
                    appointment.start.timestamp(),
                    appointment.end.timestamp()
                ],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        if overlapping > 0 {
            debug!(companion_id = %appointment.companion_id, "slot already taken");
            return Err(AmityError::Conflict(ConflictKind::SlotTaken));
        }

        tx.execute(
            "INSERT INTO appointments (id, companion_id, user_id, start_ts, end_ts, state, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                appointment.id.to_string(),
                appointment.companion_id.to_string(),
                appointment.user_id.to_string(),
                appointment.start.timestamp(),
                appointment.end.timestamp(),
                appointment.state.as_str(),
                appointment.created_at.timestamp()
            ],
        )
        .map_err(db_err)?;

        tx.commit().map_err(db_err)?;
        Ok(())
    }

    async fn update_state(&self, id: Uuid, state: AppointmentState) -> Result<()> {
        let conn = self.db.conn()?;
        let updated = conn
            .execute(
                "UPDATE appointments SET state = ?2 WHERE id = ?1",
                params![id.to_string(), state.as_str()],
            )
            .map_err(db_err)?;

        if updated == 0 {
            return Err(AmityError::NotFound(format!("appointment {id} not found")));
        }
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>> {
        let conn = self.db.conn()?;
        let result = conn.query_row(
            "SELECT id, companion_id, user_id, start_ts, end_ts, state, created_at
             FROM appointments WHERE id = ?1",
            params![id.to_string()],
            row_to_appointment,
        );

        match result {
            Ok(appointment) => Ok(Some(appointment?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(db_err(err)),
        }
    }

    async fn list_blocking_in_range(
        &self,
        companion_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>> {
        let conn = self.db.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, companion_id, user_id, start_ts, end_ts, state, created_at
                 FROM appointments
                 WHERE companion_id = ?1
                   AND state IN ('pending', 'confirmed')
                   AND start_ts < ?3 AND end_ts > ?2
                 ORDER BY start_ts",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(
                params![companion_id.to_string(), start.timestamp(), end.timestamp()],
                row_to_appointment,
            )
            .map_err(db_err)?;

        let mut appointments = Vec::new();
        for row in rows {
            appointments.push(row.map_err(db_err)??);
        }
        Ok(appointments)
    }
}

fn row_to_appointment(row: &Row<'_>) -> rusqlite::Result<Result<Appointment>> {
    let id: String = row.get(0)?;
    let companion_id: String = row.get(1)?;
    let user_id: String = row.get(2)?;
    let start_ts: i64 = row.get(3)?;
    let end_ts: i64 = row.get(4)?;
    let state: String = row.get(5)?;
    let created_at: i64 = row.get(6)?;

    Ok(build_appointment(id, companion_id, user_id, start_ts, end_ts, state, created_at))
}

fn build_appointment(
    id: String,
    companion_id: String,
    user_id: String,
    start_ts: i64,
    end_ts: i64,
    state: String,
    created_at: i64,
) -> Result<Appointment> {
    Ok(Appointment {
        id: parse_uuid(&id)?,
        companion_id: parse_uuid(&companion_id)?,
        user_id: parse_uuid(&user_id)?,
        start: parse_ts(start_ts)?,
        end: parse_ts(end_ts)?,
        state: state.parse()?,
        created_at: parse_ts(created_at)?,
    })
}

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|err| AmityError::Database(format!("invalid uuid {value}: {err}")))
}

pub(crate) fn parse_ts(value: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(value, 0)
        .single()
        .ok_or_else(|| AmityError::Database(format!("invalid timestamp {value}")))
}
