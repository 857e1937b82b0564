//! In-memory throttle store for testing.

use crate::error::{CoordinationError, Result};
use crate::providers::ThrottleStore;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// In-memory sliding-window throttle.
///
/// Entries outside the window are dropped on the next `check_and_record`
/// for that key. Production deployments use a shared store instead; this
/// mock exists so throttling behavior is testable without one.
#[derive(Debug, Clone, Default)]
pub struct MockThrottle {
    /// Map of key -> attempt timestamps (ms).
    attempts: Arc<Mutex<HashMap<String, Vec<u64>>>>,
}

impl MockThrottle {
    /// Create an empty throttle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn current_timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64
    }
}

impl ThrottleStore for MockThrottle {
    fn check_and_record(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> impl Future<Output = Result<()>> + Send {
        let attempts = Arc::clone(&self.attempts);
        let key = key.to_string();

        async move {
            let mut guard = attempts.lock().map_err(|_| CoordinationError::Internal)?;

            let now_ms = Self::current_timestamp_ms();
            #[allow(clippy::cast_possible_truncation)]
            let window_ms = window.as_millis() as u64;
            let window_start = now_ms.saturating_sub(window_ms);

            let timestamps = guard.entry(key).or_default();
            timestamps.retain(|&ts| ts >= window_start);

            if timestamps.len() >= max_attempts as usize {
                return Err(CoordinationError::RateLimited {
                    retry_after: window,
                });
            }

            timestamps.push(now_ms);
            Ok(())
        }
    }

    fn attempts(&self, key: &str) -> impl Future<Output = Result<u32>> + Send {
        let attempts = Arc::clone(&self.attempts);
        let key = key.to_string();

        async move {
            #[allow(clippy::cast_possible_truncation)]
            let count = attempts
                .lock()
                .map_err(|_| CoordinationError::Internal)?
                .get(&key)
                .map_or(0, |timestamps| timestamps.len() as u32);
            Ok(count)
        }
    }

    fn reset(&self, key: &str) -> impl Future<Output = Result<()>> + Send {
        let attempts = Arc::clone(&self.attempts);
        let key = key.to_string();

        async move {
            attempts
                .lock()
                .map_err(|_| CoordinationError::Internal)?
                .remove(&key);
            Ok(())
        }
    }
}
