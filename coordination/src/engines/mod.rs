//! The coordination engines.
//!
//! One engine per spec component: invitations, surveys, voting, and the
//! trip lifecycle. Each engine validates against the injected providers,
//! delegates durable writes to the store's atomic operations, and applies
//! advisory side effects (status transitions, notifications, email) whose
//! failures are logged and downgraded, never propagated.

use crate::providers::{Notification, NotificationSink};

pub mod invitation;
pub mod lifecycle;
pub mod survey;
pub mod voting;

pub use invitation::InvitationReconciler;
pub use lifecycle::{LifecycleEvent, advance_trip_status};
pub use survey::SurveyEngine;
pub use voting::VotingEngine;

/// Deliver a notification, swallowing and logging any failure.
///
/// Notification delivery is fire-and-forget per the error-handling policy:
/// the primary operation already succeeded by the time this runs.
pub(crate) async fn notify_quietly<N: NotificationSink>(sink: &N, notification: Notification) {
    let recipient = notification.user_id;
    if let Err(error) = sink.notify(notification).await {
        tracing::warn!(user_id = ?recipient, %error, "notification delivery failed");
    }
}
