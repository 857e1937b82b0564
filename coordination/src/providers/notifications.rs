//! Notification sink trait.

use super::Notification;
use crate::error::Result;

/// In-app notification sink.
///
/// Notification writes are fire-and-forget: engines log a failure and move
/// on, they never fail a primary operation because a notification did not
/// land.
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns error if the sink rejects the write; callers treat this as
    /// advisory.
    fn notify(
        &self,
        notification: Notification,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
