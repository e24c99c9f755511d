//! Availability reconciliation service
//!
//! Merges declared working hours with external busy intervals and existing
//! appointments into the bookable slot sequence for a date. Runs for one
//! companion are serialized; runs for different companions proceed
//! independently.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use amity_domain::constants::{RECONCILE_RUN_BUDGET_SECS, SLOT_SNAPSHOT_TTL_SECS};
use amity_domain::{AmityError, AvailabilitySlot, Result};
use chrono::{Datelike, NaiveDate};
use dashmap::DashMap;
use moka::sync::Cache;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::ports::{BusyIntervalSource, WorkingHoursRepository};
use super::slots::{build_slots, day_bounds};
use crate::booking::ports::AppointmentRepository;
use crate::companion_ports::CompanionRepository;

/// Availability reconciliation service
pub struct ReconcilerService {
    companions: Arc<dyn CompanionRepository>,
    working_hours: Arc<dyn WorkingHoursRepository>,
    appointments: Arc<dyn AppointmentRepository>,
    busy_source: Arc<dyn BusyIntervalSource>,
    run_locks: DashMap<Uuid, Arc<Mutex<()>>>,
    /// Last successful slot set per (companion, date); served when the
    /// provider is temporarily unavailable.
    snapshots: Cache<(Uuid, NaiveDate), Arc<Vec<AvailabilitySlot>>>,
    run_budget: StdDuration,
}

impl ReconcilerService {
    pub fn new(
        companions: Arc<dyn CompanionRepository>,
        working_hours: Arc<dyn WorkingHoursRepository>,
        appointments: Arc<dyn AppointmentRepository>,
        busy_source: Arc<dyn BusyIntervalSource>,
    ) -> Self {
        Self {
            companions,
            working_hours,
            appointments,
            busy_source,
            run_locks: DashMap::new(),
            snapshots: Cache::builder()
                .time_to_live(StdDuration::from_secs(SLOT_SNAPSHOT_TTL_SECS))
                .max_capacity(10_000)
                .build(),
            run_budget: StdDuration::from_secs(RECONCILE_RUN_BUDGET_SECS),
        }
    }

    /// Override the wall-clock budget for a single run (tests).
    pub fn with_run_budget(mut self, budget: StdDuration) -> Self {
        self.run_budget = budget;
        self
    }

    /// Recompute the slot sequence for a companion and date.
    ///
    /// Serialized per companion: a run started by a webhook never
    /// interleaves with another run for the same companion. A run that
    /// exceeds the wall-clock budget is abandoned and retried on the next
    /// trigger.
    #[instrument(skip(self))]
    pub async fn reconcile(
        &self,
        companion_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilitySlot>> {
        let lock = self.run_locks.entry(companion_id).or_default().clone();
        let _guard = lock.lock().await;

        match tokio::time::timeout(self.run_budget, self.run(companion_id, date)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%companion_id, %date, budget_secs = self.run_budget.as_secs(), "reconciliation run abandoned");
                Err(AmityError::ExternalService(
                    "reconciliation exceeded its wall-clock budget".into(),
                ))
            }
        }
    }

    async fn run(&self, companion_id: Uuid, date: NaiveDate) -> Result<Vec<AvailabilitySlot>> {
        let companion = self.companions.get(companion_id).await?.ok_or_else(|| {
            AmityError::NotFound(format!("companion {companion_id} not found"))
        })?;
        let tz = companion.timezone.parse::<chrono_tz::Tz>().map_err(|_| {
            AmityError::Config(format!("companion timezone invalid: {}", companion.timezone))
        })?;

        // Snapshot read of the rules: an edit mid-run applies next run.
        let rules =
            self.working_hours.rules_for_weekday(companion_id, date.weekday()).await?;
        let (day_start, day_end) = day_bounds(date, tz)?;

        let busy = match self.busy_source.list_busy_intervals(companion_id, day_start, day_end).await
        {
            Ok(busy) => busy,
            Err(err) if err.is_transient() => {
                // Calendar temporarily unavailable: fall back to the last
                // successfully computed slot set rather than failing the
                // booking flow entirely.
                if let Some(snapshot) = self.snapshots.get(&(companion_id, date)) {
                    warn!(%companion_id, %date, error = %err, "serving stale slot snapshot");
                    return Ok(snapshot.as_ref().clone());
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };

        let appointments =
            self.appointments.list_blocking_in_range(companion_id, day_start, day_end).await?;

        let slots = build_slots(companion_id, date, &rules, &busy, &appointments)?;
        debug!(%companion_id, %date, slot_count = slots.len(), "reconciliation complete");

        self.snapshots.insert((companion_id, date), Arc::new(slots.clone()));
        Ok(slots)
    }
}
