//! Core entity types for the coordination engine.
//!
//! All types are `Clone` and serde-serializable; durability is owned by the
//! [`CoordinationStore`](crate::providers::CoordinationStore) collaborator,
//! not by these structs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ═══════════════════════════════════════════════════════════════════════
// ID Types
// ═══════════════════════════════════════════════════════════════════════

/// Unique identifier for a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripId(pub uuid::Uuid);

impl TripId {
    /// Generate a new random `TripId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for TripId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub uuid::Uuid);

impl UserId {
    /// Generate a new random `UserId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a survey.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurveyId(pub uuid::Uuid);

impl SurveyId {
    /// Generate a new random `SurveyId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SurveyId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a voting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Generate a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Trips & Membership
// ═══════════════════════════════════════════════════════════════════════

/// Coarse-grained planning status of a trip.
///
/// Statuses advance forward through the planning pipeline. The status is an
/// advisory progress indicator, not a gate: engines update it best-effort
/// and never fail a primary operation because a transition did not apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TripStatus {
    /// Trip exists; nobody has been invited yet.
    Planning,

    /// At least one invitation has gone out.
    Inviting,

    /// A preferences survey is (or has been) collecting answers.
    Surveying,

    /// One or more voting sessions are (or have been) running.
    Voting,

    /// The group has booked the trip.
    Booked,

    /// The trip is underway.
    InProgress,

    /// The trip finished.
    Completed,

    /// The trip was called off (set by an external collaborator).
    Cancelled,
}

impl TripStatus {
    /// Returns `true` for statuses the coordination core never overwrites.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A trip being planned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Trip id.
    pub id: TripId,

    /// Display title, also used in invitation emails.
    pub title: String,

    /// Account that owns the trip.
    pub owner: UserId,

    /// Current planning status.
    pub status: TripStatus,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Role of a member within a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Ordinary member: answers surveys and casts votes.
    Member,

    /// Organizer: everything a member can do, plus creating invitations,
    /// surveys, and voting sessions.
    Admin,

    /// Trip owner: same powers as admin.
    Owner,
}

impl Role {
    /// Returns `true` if the role may create invitations, surveys, and
    /// voting sessions.
    #[must_use]
    pub const fn can_organize(self) -> bool {
        matches!(self, Self::Admin | Self::Owner)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Member => write!(f, "MEMBER"),
            Self::Admin => write!(f, "ADMIN"),
            Self::Owner => write!(f, "OWNER"),
        }
    }
}

/// Membership of a user in a trip.
///
/// Memberships are the quorum denominator for surveys and votes, and the
/// authorization predicate for organizer operations. They are created when
/// an invitation is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    /// Trip the membership belongs to.
    pub trip_id: TripId,

    /// Member account.
    pub user_id: UserId,

    /// Role within the trip.
    pub role: Role,

    /// When the membership was created.
    pub joined_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// Invitations
// ═══════════════════════════════════════════════════════════════════════

/// Status of a durable invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    /// Waiting for the invitee to respond.
    Pending,

    /// Invitee accepted; a membership exists.
    Accepted,

    /// Invitee declined.
    Declined,

    /// Deadline passed before the invitee responded.
    Expired,
}

/// Invitation addressed to an existing account.
///
/// At most one row exists per `(trip_id, user_id)`; re-inviting a pending,
/// non-member user refreshes `expires_at` instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invitation {
    /// Trip the user is invited to.
    pub trip_id: TripId,

    /// Invited account.
    pub user_id: UserId,

    /// Account that sent the invitation.
    pub invited_by: UserId,

    /// Current status.
    pub status: InvitationStatus,

    /// When the invitation was first created.
    pub created_at: DateTime<Utc>,

    /// Deadline for responding.
    pub expires_at: DateTime<Utc>,
}

/// Invitation addressed to an email with no account yet.
///
/// At most one row exists per `(email, trip_id)`. The moment an account is
/// created for the email, every matching row is promoted into a durable
/// [`Invitation`] and deleted, so the two never coexist for the same
/// `(trip, identity)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInvitation {
    /// Invited email address.
    pub email: String,

    /// Trip the email is invited to.
    pub trip_id: TripId,

    /// Account that sent the invitation.
    pub invited_by: UserId,

    /// When the invitation was first created.
    pub created_at: DateTime<Utc>,

    /// Deadline; expired rows are never promoted.
    pub expires_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// Surveys
// ═══════════════════════════════════════════════════════════════════════

/// Status of a survey. Closing is irreversible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SurveyStatus {
    /// Accepting responses.
    Active,

    /// Closed; terminal.
    Closed,
}

/// Declared shape of the answers a question accepts.
///
/// This is the tagged union that replaces the opaque JSON question payloads
/// of the original product: every answer is validated against the declared
/// kind at the submission boundary, never deep inside the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    /// Free-form text.
    FreeText,

    /// A single number (budget, group size, ...).
    Number,

    /// Exactly one choice from a fixed list.
    SingleChoice {
        /// Permitted choices.
        choices: Vec<String>,
    },

    /// Any subset of a fixed list.
    MultiChoice {
        /// Permitted choices.
        choices: Vec<String>,
    },

    /// An inclusive start/end date range.
    DateRange,
}

/// One question within a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Question id, unique within the survey.
    pub id: String,

    /// Prompt shown to members.
    pub prompt: String,

    /// Declared answer shape.
    pub kind: QuestionKind,
}

/// A typed answer value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    /// Free-form text, or the selected choice of a single-choice question.
    Text(String),

    /// A single number.
    Number(f64),

    /// Selected choices of a multi-choice question.
    TextList(Vec<String>),

    /// A list of numbers.
    NumberList(Vec<f64>),

    /// An inclusive date range.
    DateRange {
        /// First day.
        start: NaiveDate,
        /// Last day.
        end: NaiveDate,
    },
}

/// A preferences survey for a trip. At most one exists per trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    /// Survey id.
    pub id: SurveyId,

    /// Trip the survey belongs to (unique).
    pub trip_id: TripId,

    /// Display title.
    pub title: String,

    /// Current status.
    pub status: SurveyStatus,

    /// Ordered question definitions.
    pub questions: Vec<Question>,

    /// Organizer who opened the survey.
    pub created_by: UserId,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Advisory response deadline.
    pub expires_at: DateTime<Utc>,
}

impl Survey {
    /// Look up a question by id.
    #[must_use]
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// One member's answers to a survey, keyed by question id.
///
/// Upsert semantics: resubmission by the same user overwrites the previous
/// answers without creating a second row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    /// Survey the response belongs to.
    pub survey_id: SurveyId,

    /// Responding member.
    pub user_id: UserId,

    /// Answers keyed by question id.
    pub answers: BTreeMap<String, AnswerValue>,

    /// Last submission timestamp.
    pub submitted_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════════════════════════════════
// Voting
// ═══════════════════════════════════════════════════════════════════════

/// What a voting session decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionKind {
    /// Where to go.
    Destination,

    /// What to do there.
    Activity,

    /// When to travel.
    Date,

    /// Where to stay.
    Accommodation,

    /// Anything else the organizers put to a vote.
    Custom,
}

/// Status of a voting session. Closing is terminal, whether reached by
/// quorum or by deadline expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Accepting votes.
    Active,

    /// Closed; terminal.
    Closed,
}

/// One option in a voting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteOption {
    /// Option id, unique within the session.
    pub id: String,

    /// Display title.
    pub title: String,

    /// Optional longer description.
    pub description: Option<String>,
}

/// A voting session. A trip may run several, concurrently or in sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VotingSession {
    /// Session id.
    pub id: SessionId,

    /// Trip the session belongs to.
    pub trip_id: TripId,

    /// What the session decides.
    pub kind: SessionKind,

    /// Display title.
    pub title: String,

    /// Current status.
    pub status: SessionStatus,

    /// Ordered options; ids are unique within the session.
    pub options: Vec<VoteOption>,

    /// Organizer who opened the session.
    pub created_by: UserId,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Voting deadline, checked lazily on access.
    pub expires_at: DateTime<Utc>,
}

impl VotingSession {
    /// Returns `true` if the session offers the given option.
    #[must_use]
    pub fn has_option(&self, option_id: &str) -> bool {
        self.options.iter().any(|o| o.id == option_id)
    }
}

/// A single vote row.
///
/// Votes are keyed by `(session_id, voter_id, option_id)`: recasting the
/// same option updates the rank, while voting for a second option adds a
/// row. Turnout is therefore measured by distinct voters, not row count;
/// this one storage shape covers single-choice, multi-select, and ranked
/// sessions alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    /// Session the vote belongs to.
    pub session_id: SessionId,

    /// Voting member.
    pub voter_id: UserId,

    /// Chosen option.
    pub option_id: String,

    /// Optional rank for ranked sessions (1 = most preferred).
    pub rank: Option<u32>,

    /// Last cast timestamp.
    pub cast_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses() {
        assert!(TripStatus::Completed.is_terminal());
        assert!(TripStatus::Cancelled.is_terminal());
        assert!(!TripStatus::Planning.is_terminal());
        assert!(!TripStatus::Booked.is_terminal());
    }

    #[test]
    fn organizer_roles() {
        assert!(Role::Owner.can_organize());
        assert!(Role::Admin.can_organize());
        assert!(!Role::Member.can_organize());
    }

    #[test]
    fn answer_value_serializes_as_tagged_union() {
        let answer = AnswerValue::DateRange {
            start: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap_or_default(),
        };
        let json = serde_json::to_value(&answer).unwrap_or_default();
        assert_eq!(json["type"], "date_range");
        assert_eq!(json["value"]["start"], "2026-09-01");
    }
}
