//! Coordination providers.
//!
//! This module defines traits for every external collaborator the
//! coordination engines depend on. The engines are written against these
//! traits, and the runtime supplies concrete implementations.
//!
//! This enables:
//! - **Testing**: in-memory mocks, deterministic clocks
//! - **Production**: PostgreSQL storage, SMTP delivery, a shared throttle
//! - **Horizontal scaling**: nothing in the core holds process-local state;
//!   even the rate-limit counters live behind an injected [`ThrottleStore`]

use crate::state::{TripId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod accounts;
pub mod clock;
pub mod console_mailer;
pub mod mailer;
pub mod membership;
pub mod notifications;
pub mod smtp_mailer;
pub mod store;
pub mod throttle;

// Re-export provider traits
pub use accounts::AccountDirectory;
pub use clock::{Clock, SystemClock};
pub use console_mailer::ConsoleMailer;
pub use mailer::InvitationMailer;
pub use membership::MembershipDirectory;
pub use notifications::NotificationSink;
pub use smtp_mailer::SmtpMailer;
pub use store::{CoordinationStore, InvitationWrite, PendingWrite, SubmissionOutcome, TripStatusUpdate};
pub use throttle::ThrottleStore;

/// A user account, as seen through the identity collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub user_id: UserId,

    /// Email address.
    pub email: String,

    /// Display name, if the user set one.
    pub display_name: Option<String>,
}

impl Account {
    /// Name to show in emails and notifications; falls back to the email
    /// address when the user has no display name.
    #[must_use]
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}

/// Category of an in-app notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// You were invited to a trip.
    TripInvite,

    /// Someone accepted your invitation.
    InviteAccepted,

    /// A survey opened on one of your trips.
    SurveyOpened,

    /// A voting session opened on one of your trips.
    VotingOpened,
}

/// An in-app notification handed to the [`NotificationSink`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient.
    pub user_id: UserId,

    /// Category.
    pub kind: NotificationKind,

    /// Short title.
    pub title: String,

    /// Body text.
    pub message: String,

    /// Structured payload for the client (trip id, survey id, ...).
    pub payload: serde_json::Value,
}

impl Notification {
    /// Build a notification carrying a trip reference in its payload.
    #[must_use]
    pub fn for_trip(
        user_id: UserId,
        kind: NotificationKind,
        title: impl Into<String>,
        message: impl Into<String>,
        trip_id: TripId,
    ) -> Self {
        Self {
            user_id,
            kind,
            title: title.into(),
            message: message.into(),
            payload: serde_json::json!({ "trip_id": trip_id }),
        }
    }
}

/// An invitation email, as handed to the [`InvitationMailer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationEmail {
    /// Recipient address.
    pub to: String,

    /// Title of the trip the recipient is invited to.
    pub trip_title: String,

    /// Display name of the inviter.
    pub inviter_name: String,

    /// Trip id, for building the join link.
    pub trip_id: TripId,

    /// Invitation deadline, surfaced in the email body.
    pub expires_at: DateTime<Utc>,
}
