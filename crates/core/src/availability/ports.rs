//! Port interfaces for availability reconciliation

use async_trait::async_trait;
use amity_domain::{BusyInterval, Result, WorkingHoursRule};
use chrono::{DateTime, Utc, Weekday};
use uuid::Uuid;

/// Trait for reading a companion's declared working hours
///
/// Reads are snapshot-consistent per reconciliation run: a rule edited
/// mid-run takes effect only on the next run.
#[async_trait]
pub trait WorkingHoursRepository: Send + Sync {
    /// All rules for the companion on the given weekday
    async fn rules_for_weekday(
        &self,
        companion_id: Uuid,
        weekday: Weekday,
    ) -> Result<Vec<WorkingHoursRule>>;

    /// Insert or replace one rule
    async fn upsert_rule(&self, rule: &WorkingHoursRule) -> Result<()>;
}

/// Trait for fetching external busy intervals
///
/// Implemented by the calendar gateway; returns intervals ordered by start.
#[async_trait]
pub trait BusyIntervalSource: Send + Sync {
    async fn list_busy_intervals(
        &self,
        companion_id: Uuid,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<Vec<BusyInterval>>;
}
