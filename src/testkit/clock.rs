//! Manually advanced clock for TTL tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::RwLock;

use crate::port::Clock;

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at a fixed, arbitrary instant.
    #[must_use]
    pub fn new() -> Self {
        let start = Utc.with_ymd_and_hms(2024, 10, 17, 12, 0, 0).unwrap();
        Self {
            now: RwLock::new(start),
        }
    }

    #[must_use]
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.write() += by;
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
