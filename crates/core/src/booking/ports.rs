//! Port interfaces for appointment persistence

use async_trait::async_trait;
use amity_domain::{Appointment, AppointmentState, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Trait for persisting appointments
///
/// The store owns the overlap invariant: for a given companion no two
/// appointments in a slot-blocking state may overlap.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Insert a pending appointment if and only if no pending/confirmed
    /// appointment overlaps its range. The check and the insert are a
    /// single atomic unit; an overlap fails with
    /// `AmityError::Conflict(SlotTaken)`.
    async fn insert_pending_if_free(&self, appointment: &Appointment) -> Result<()>;

    /// Transition an appointment's state
    async fn update_state(&self, id: Uuid, state: AppointmentState) -> Result<()>;

    /// Fetch one appointment by id
    async fn get(&self, id: Uuid) -> Result<Option<Appointment>>;

    /// All pending/confirmed appointments intersecting `[start, end)` for
    /// the companion, ordered by start
    async fn list_blocking_in_range(
        &self,
        companion_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>>;
}
