//! Clock abstraction
//!
//! The acquisition loop needs two kinds of time: a monotonic instant for
//! file ages and a wall-clock timestamp stamped on each decoded record.
//! Both come from a [`Clock`] so rotation and decoding can be tested
//! without sleeping.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync {
    /// Monotonic time, used for rotation ages
    fn now(&self) -> Instant;

    /// Wall-clock time, stamped on decoded records
    fn wall(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Monotonic and wall time advance together.
#[derive(Debug)]
pub struct ManualClock {
    base_instant: Instant,
    base_wall: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualClock {
    /// Create a clock frozen at the given wall time
    pub fn new(wall: DateTime<Utc>) -> Self {
        Self {
            base_instant: Instant::now(),
            base_wall: wall,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base_instant + self.elapsed()
    }

    fn wall(&self) -> DateTime<Utc> {
        let offset = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::zero());
        self.base_wall + offset
    }
}
