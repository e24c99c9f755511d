//! Pure slot computation
//!
//! Turns working-hour windows, external busy intervals and existing
//! appointments into an ordered slot sequence. Deterministic: identical
//! inputs always produce an identical sequence, so repeated reconciliation
//! runs without underlying changes are idempotent.

use amity_domain::constants::SLOT_LENGTH_MINUTES;
use amity_domain::{
    AmityError, Appointment, AvailabilitySlot, BusyInterval, Result, SlotState, WorkingHoursRule,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use uuid::Uuid;

/// UTC bounds of the civil day `date` in timezone `tz`.
pub fn day_bounds(date: NaiveDate, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = resolve_local(tz, midnight(date)?)?;
    let end = resolve_local(tz, midnight(date.succ_opt().ok_or_else(date_overflow)?)?)?;
    Ok((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

/// Compute the ordered slot sequence for one companion and date.
///
/// - overlapping working-hour windows are unioned before slotting;
/// - slots are fixed-length, aligned to the window start;
/// - a busy interval that even partially overlaps a slot removes it
///   (never offer a slot that could not be fully honored);
/// - a slot overlapping a pending/confirmed appointment stays in the
///   sequence marked [`SlotState::Booked`]; internal booked state always
///   wins over a stale external read.
pub fn build_slots(
    companion_id: Uuid,
    date: NaiveDate,
    rules: &[WorkingHoursRule],
    busy: &[BusyInterval],
    appointments: &[Appointment],
) -> Result<Vec<AvailabilitySlot>> {
    let windows = union_windows(collect_windows(date, rules)?);
    let step = Duration::minutes(SLOT_LENGTH_MINUTES);

    let mut slots = Vec::new();
    for (window_start, window_end) in windows {
        let mut slot_start = window_start;
        while slot_start + step <= window_end {
            let slot_end = slot_start + step;

            if busy.iter().any(|b| b.overlaps(slot_start, slot_end)) {
                slot_start = slot_end;
                continue;
            }

            let state = if appointments
                .iter()
                .any(|a| a.state.blocks_slot() && a.overlaps(slot_start, slot_end))
            {
                SlotState::Booked
            } else {
                SlotState::Free
            };

            slots.push(AvailabilitySlot {
                companion_id,
                start: slot_start,
                end: slot_end,
                state,
            });
            slot_start = slot_end;
        }
    }

    Ok(slots)
}

/// Working-hour windows for `date`, as UTC instants.
fn collect_windows(
    date: NaiveDate,
    rules: &[WorkingHoursRule],
) -> Result<Vec<(DateTime<Utc>, DateTime<Utc>)>> {
    let mut windows = Vec::new();
    for rule in rules {
        if rule.weekday != date.weekday() || rule.end <= rule.start {
            continue;
        }
        let tz = rule.tz()?;
        let start = resolve_local(tz, date.and_time(rule.start))?.with_timezone(&Utc);
        let end = resolve_local(tz, date.and_time(rule.end))?.with_timezone(&Utc);
        windows.push((start, end));
    }
    Ok(windows)
}

/// Merge overlapping or touching windows into a disjoint, sorted set.
fn union_windows(
    mut windows: Vec<(DateTime<Utc>, DateTime<Utc>)>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    windows.sort_by_key(|(start, end)| (*start, *end));

    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(windows.len());
    for (start, end) in windows {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => {
                if end > *last_end {
                    *last_end = end;
                }
            }
            _ => merged.push((start, end)),
        }
    }
    merged
}

/// Resolve a local wall-clock time in `tz`, picking the earlier instant for
/// ambiguous times and skipping forward over DST gaps.
fn resolve_local(tz: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
        .ok_or_else(|| {
            AmityError::InvalidInput(format!("unrepresentable local time {naive} in {tz}"))
        })
}

fn midnight(date: NaiveDate) -> Result<NaiveDateTime> {
    date.and_hms_opt(0, 0, 0).ok_or_else(date_overflow)
}

fn date_overflow() -> AmityError {
    AmityError::InvalidInput("date out of range".into())
}
