//! Fixed clock for deterministic tests.

use crate::providers::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};

/// Fixed clock.
///
/// Always returns the time it was set to, making lazy-expiry behavior
/// reproducible. Tests move time forward explicitly with
/// [`advance`](FixedClock::advance).
#[derive(Debug, Clone)]
pub struct FixedClock {
    time: Arc<Mutex<DateTime<Utc>>>,
}

impl FixedClock {
    /// Create a clock frozen at the given time.
    #[must_use]
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Arc::new(Mutex::new(time)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        match self.time.lock() {
            Ok(mut guard) => *guard = *guard + by,
            Err(mut poisoned) => {
                let guard = poisoned.get_mut();
                **guard = **guard + by;
            }
        }
    }
}

impl Default for FixedClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        match self.time.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
