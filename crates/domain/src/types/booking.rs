//! Scheduling and booking types
//!
//! Working-hour rules, derived availability slots and committed
//! appointments.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AmityError, Result};

/// Declared working-hour window for one weekday.
///
/// Snapshot-read by a reconciliation run: a concurrent edit takes effect
/// only on the next run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHoursRule {
    pub companion_id: Uuid,
    pub weekday: Weekday,
    pub start: NaiveTime,
    pub end: NaiveTime,
    /// IANA timezone name, e.g. `Europe/Berlin`.
    pub timezone: String,
}

impl WorkingHoursRule {
    /// Parse the rule's IANA timezone.
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| AmityError::InvalidInput(format!("unknown timezone: {}", self.timezone)))
    }
}

/// State of a derived availability slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Free,
    Booked,
}

/// A fixed-length bookable interval derived from working hours, external
/// busy blocks and existing appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilitySlot {
    pub companion_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub state: SlotState,
}

/// Appointment lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentState {
    Pending,
    Confirmed,
    Cancelled,
}

impl AppointmentState {
    /// States that occupy a slot.
    pub fn blocks_slot(self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::str::FromStr for AppointmentState {
    type Err = AmityError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "cancelled" => Ok(Self::Cancelled),
            other => {
                Err(AmityError::InvalidInput(format!("unknown appointment state: {other}")))
            }
        }
    }
}

/// A committed (or in-flight) booking of one slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub companion_id: Uuid,
    pub user_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub state: AppointmentState,
    pub created_at: DateTime<Utc>,
}

impl Appointment {
    /// Half-open interval overlap check against `[start, end)`.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start < end && start < self.end
    }
}
