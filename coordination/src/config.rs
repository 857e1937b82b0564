//! Coordination configuration.
//!
//! Configuration values are provided by the application, not hardcoded in
//! the engines.

use chrono::Duration;

/// Invitation reconciler configuration.
#[derive(Debug, Clone)]
pub struct InvitationConfig {
    /// Default invitation time-to-live.
    ///
    /// Default: 7 days
    pub default_ttl: Duration,

    /// Maximum invite batches one inviter may send per throttle window.
    ///
    /// Default: 10
    pub max_batches_per_window: u32,

    /// Throttle window for invite batches.
    ///
    /// Default: 1 hour
    pub throttle_window: std::time::Duration,
}

impl InvitationConfig {
    /// Create a new invitation configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self {
            default_ttl: Duration::days(7),
            max_batches_per_window: 10,
            throttle_window: std::time::Duration::from_secs(3600),
        }
    }

    /// Set the default invitation time-to-live.
    #[must_use]
    pub const fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the invite-batch throttle.
    #[must_use]
    pub const fn with_throttle(mut self, max_batches: u32, window: std::time::Duration) -> Self {
        self.max_batches_per_window = max_batches;
        self.throttle_window = window;
        self
    }
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self::new()
    }
}
