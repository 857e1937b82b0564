//! Throttle store trait.
//!
//! The original product kept rate-limit counters in process-local maps.
//! Here they live behind an injected, swappable store so the coordination
//! core never depends on process memory and can scale horizontally.
//!
//! # Implementation
//!
//! Production deployments back this with a shared store (Redis-style
//! counters with TTL); tests use the in-memory sliding-window mock.

use crate::error::Result;
use std::time::Duration;

/// Sliding-window attempt counter.
pub trait ThrottleStore: Send + Sync {
    /// Check the key against the limit and record one attempt, atomically.
    ///
    /// # Arguments
    ///
    /// * `key` - Throttle key (e.g. the inviter's user id)
    /// * `max_attempts` - Maximum attempts allowed in the window
    /// * `window` - Window duration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The limit is exceeded → `CoordinationError::RateLimited`
    /// - The underlying store fails
    fn check_and_record(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Current attempt count for a key within its window.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying store fails.
    fn attempts(&self, key: &str) -> impl std::future::Future<Output = Result<u32>> + Send;

    /// Clear the counter for a key.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying store fails.
    fn reset(&self, key: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}
