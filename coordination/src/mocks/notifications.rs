//! Mock notification sink for testing.

use crate::error::{CoordinationError, Result};
use crate::providers::{Notification, NotificationKind, NotificationSink};
use crate::state::UserId;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Mock notification sink.
///
/// Records every delivered notification; can be switched into failure mode
/// to verify that notification failures never surface to callers.
#[derive(Debug, Clone, Default)]
pub struct MockNotificationSink {
    fail: Arc<Mutex<bool>>,
    delivered: Arc<Mutex<Vec<Notification>>>,
}

impl MockNotificationSink {
    /// Create a sink that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent delivery fail (or succeed again).
    pub fn fail_all(&self, fail: bool) {
        if let Ok(mut guard) = self.fail.lock() {
            *guard = fail;
        }
    }

    /// Notifications delivered so far.
    ///
    /// # Errors
    ///
    /// Returns error if the sink mutex is poisoned.
    pub fn delivered(&self) -> Result<Vec<Notification>> {
        Ok(self
            .delivered
            .lock()
            .map_err(|_| CoordinationError::Internal)?
            .clone())
    }

    /// Delivered notifications of one kind addressed to one user.
    ///
    /// # Errors
    ///
    /// Returns error if the sink mutex is poisoned.
    pub fn delivered_to(&self, user_id: UserId, kind: NotificationKind) -> Result<usize> {
        Ok(self
            .delivered()?
            .iter()
            .filter(|n| n.user_id == user_id && n.kind == kind)
            .count())
    }
}

impl NotificationSink for MockNotificationSink {
    fn notify(&self, notification: Notification) -> impl Future<Output = Result<()>> + Send {
        let fail = Arc::clone(&self.fail);
        let delivered = Arc::clone(&self.delivered);

        async move {
            if *fail.lock().map_err(|_| CoordinationError::Internal)? {
                return Err(CoordinationError::Storage(
                    "mock notification failure".to_string(),
                ));
            }
            delivered
                .lock()
                .map_err(|_| CoordinationError::Internal)?
                .push(notification);
            Ok(())
        }
    }
}
