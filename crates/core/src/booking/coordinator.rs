//! Booking coordinator
//!
//! Turns a free slot into a confirmed appointment exactly once:
//! per-(companion, slot) exclusivity with a bounded wait, a live
//! re-verification against current appointment records, and a quota
//! reservation that succeeds or fails together with the booking.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use amity_common::time::Clock;
use amity_domain::constants::{SLOT_LENGTH_MINUTES, SLOT_LOCK_WAIT_SECS};
use amity_domain::{
    AmityError, Appointment, AppointmentState, ConflictKind, Result,
};
use chrono::{DateTime, Duration, Timelike, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::ports::AppointmentRepository;
use crate::billing::QuotaLedger;

/// Booking coordinator
pub struct BookingCoordinator {
    appointments: Arc<dyn AppointmentRepository>,
    quota: Arc<QuotaLedger>,
    clock: Arc<dyn Clock>,
    slot_locks: DashMap<(Uuid, DateTime<Utc>), Arc<Mutex<()>>>,
    lock_wait: StdDuration,
}

impl BookingCoordinator {
    pub fn new(
        appointments: Arc<dyn AppointmentRepository>,
        quota: Arc<QuotaLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            appointments,
            quota,
            clock,
            slot_locks: DashMap::new(),
            lock_wait: StdDuration::from_secs(SLOT_LOCK_WAIT_SECS),
        }
    }

    /// Override the bounded wait for the slot guarantee (tests).
    pub fn with_lock_wait(mut self, wait: StdDuration) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Book one slot for one user.
    ///
    /// Exactly one of N concurrent attempts for the same
    /// (companion, slot) commits; the rest observe the post-commit state
    /// and fail with `Conflict(SlotTaken)`. An attempt that cannot acquire
    /// the slot guarantee within the bounded wait fails with
    /// `Conflict(Busy)` rather than blocking indefinitely.
    #[instrument(skip(self))]
    pub async fn book(
        &self,
        companion_id: Uuid,
        user_id: Uuid,
        slot_start: DateTime<Utc>,
        slot_end: DateTime<Utc>,
    ) -> Result<Appointment> {
        validate_slot_range(slot_start, slot_end)?;

        let lock = self.slot_locks.entry((companion_id, slot_start)).or_default().clone();
        let guard = tokio::time::timeout(self.lock_wait, lock.lock()).await.map_err(|_| {
            warn!(%companion_id, %slot_start, "slot guarantee not acquired within bounded wait");
            AmityError::Conflict(ConflictKind::Busy)
        })?;

        // Re-verify against current appointment records, not a cached
        // availability view.
        let blocking = self
            .appointments
            .list_blocking_in_range(companion_id, slot_start, slot_end)
            .await?;
        if !blocking.is_empty() {
            return Err(AmityError::Conflict(ConflictKind::SlotTaken));
        }

        // Reserve quota before creating any appointment row.
        self.quota.reserve(user_id).await?;

        let appointment = Appointment {
            id: Uuid::now_v7(),
            companion_id,
            user_id,
            start: slot_start,
            end: slot_end,
            state: AppointmentState::Pending,
            created_at: self.clock.now_utc(),
        };

        if let Err(err) = self.commit(&appointment).await {
            // Reservation and booking succeed or fail together.
            if let Err(release_err) = self.quota.release(user_id).await {
                warn!(%user_id, error = %release_err, "quota rollback failed");
            }
            return Err(err);
        }

        drop(guard);
        info!(appointment_id = %appointment.id, %companion_id, %user_id, "appointment confirmed");
        Ok(Appointment { state: AppointmentState::Confirmed, ..appointment })
    }

    /// Cancel an appointment owned by `user_id`. Idempotent: cancelling an
    /// already-cancelled appointment is a no-op.
    #[instrument(skip(self))]
    pub async fn cancel(&self, appointment_id: Uuid, user_id: Uuid) -> Result<()> {
        let appointment = self.appointments.get(appointment_id).await?.ok_or_else(|| {
            AmityError::NotFound(format!("appointment {appointment_id} not found"))
        })?;

        if appointment.user_id != user_id {
            return Err(AmityError::NotFound(format!(
                "appointment {appointment_id} not found"
            )));
        }

        if appointment.state.blocks_slot() {
            self.appointments.update_state(appointment_id, AppointmentState::Cancelled).await?;
            info!(%appointment_id, "appointment cancelled");
        }
        Ok(())
    }

    async fn commit(&self, appointment: &Appointment) -> Result<()> {
        self.appointments.insert_pending_if_free(appointment).await?;
        self.appointments.update_state(appointment.id, AppointmentState::Confirmed).await
    }
}

/// A bookable range is exactly one slot long and aligned to the slot grid.
fn validate_slot_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if end - start != Duration::minutes(SLOT_LENGTH_MINUTES) {
        return Err(AmityError::InvalidInput(format!(
            "booking range must be exactly {SLOT_LENGTH_MINUTES} minutes"
        )));
    }
    let aligned = i64::from(start.minute()) % SLOT_LENGTH_MINUTES == 0
        && start.second() == 0
        && start.nanosecond() == 0;
    if !aligned {
        return Err(AmityError::InvalidInput(
            "booking start must be aligned to the slot grid".into(),
        ));
    }
    Ok(())
}
