use crate::types::Timestamp;
use chrono::Utc;
use parking_lot::Mutex;
use std::time::Duration;

/// Source of "now" in the chain's clock domain (microseconds).
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Wall clock, normalized from milliseconds to chain microseconds.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let millis = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        Timestamp::from_millis(millis)
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: Timestamp) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = now.saturating_add(by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}
