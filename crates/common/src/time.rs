//! Time abstraction for testability
//!
//! Provides a trait-based approach to wall-clock reads so expiry logic can
//! be tested deterministically without real time passing.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Trait for wall-clock reads to enable testing
pub trait Clock: Send + Sync {
    /// Current wall clock time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real system clock implementation
///
/// Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for deterministic testing
///
/// Starts at a fixed instant and advances only when told to.
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a mock clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(start)) }
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard = *guard + delta;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, now: DateTime<Utc>) {
        let mut guard = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *guard = now;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn mock_clock_advances_deterministically() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).single().expect("valid time");
        let clock = MockClock::new(start);

        assert_eq!(clock.now_utc(), start);
        clock.advance(Duration::minutes(10));
        assert_eq!(clock.now_utc(), start + Duration::minutes(10));
    }

    #[test]
    fn mock_clock_is_shared_across_clones() {
        let start = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).single().expect("valid time");
        let clock = MockClock::new(start);
        let clone = clock.clone();

        clone.advance(Duration::seconds(30));
        assert_eq!(clock.now_utc(), start + Duration::seconds(30));
    }
}
