use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Every place that decides something by comparing against a stored
/// absolute instant reads "now" through this trait, never `Utc::now()`
/// directly, so tests can drive the sweeper/expiration/retry logic
/// without real sleeping (Design Notes, spec.md §9).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for deterministic tests.
pub struct FakeClock {
    now: RwLock<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write() = at;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut guard = self.now.write();
        *guard = *guard + by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}
