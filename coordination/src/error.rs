//! Error types for coordination operations.

use crate::state::Role;
use thiserror::Error;

/// Result type alias for coordination operations.
pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Error taxonomy for the coordination core.
///
/// Variants are grouped by the failure class they represent: authorization,
/// missing resources, lifecycle conflicts, deadline expiry, input validation,
/// throttling, and collaborator faults. Validation and authorization errors
/// abort the single operation without mutating state; collaborator faults in
/// advisory side effects (email, notifications, status updates) are logged
/// and downgraded, never surfaced through this enum.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordinationError {
    // ═══════════════════════════════════════════════════════════
    // Authorization
    // ═══════════════════════════════════════════════════════════

    /// Actor lacks the role required for this operation.
    #[error("requires {required} role or higher on this trip")]
    Unauthorized {
        /// Minimum role that would have been accepted.
        required: Role,
    },

    /// Actor is not a member of the trip at all.
    #[error("not a member of this trip")]
    NotAMember,

    // ═══════════════════════════════════════════════════════════
    // Missing resources
    // ═══════════════════════════════════════════════════════════

    /// Referenced trip does not exist.
    #[error("trip not found")]
    TripNotFound,

    /// Trip has no survey.
    #[error("survey not found")]
    SurveyNotFound,

    /// Referenced voting session does not exist.
    #[error("voting session not found")]
    SessionNotFound,

    /// No invitation exists for this trip and user.
    #[error("invitation not found")]
    InvitationNotFound,

    // ═══════════════════════════════════════════════════════════
    // Lifecycle conflicts
    // ═══════════════════════════════════════════════════════════

    /// The trip already has a survey (any status).
    #[error("trip already has a survey")]
    SurveyAlreadyExists,

    /// Survey is closed and no longer accepts responses.
    #[error("survey is not active")]
    SurveyNotActive,

    /// Voting session is closed and no longer accepts votes.
    #[error("voting session is not active")]
    SessionNotActive,

    /// Invitation has already been accepted or declined.
    #[error("invitation is no longer pending")]
    InvitationNotPending,

    // ═══════════════════════════════════════════════════════════
    // Deadline expiry (discovered lazily)
    // ═══════════════════════════════════════════════════════════

    /// Voting session passed its deadline; it has been closed as a side
    /// effect of the access that discovered the expiry.
    #[error("voting session has expired")]
    SessionExpired,

    /// Invitation passed its deadline before being answered.
    #[error("invitation has expired")]
    InvitationExpired,

    // ═══════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════

    /// Submitted answer references a question the survey does not have.
    #[error("unknown question: {question}")]
    UnknownQuestion {
        /// Question id supplied by the caller.
        question: String,
    },

    /// Answer value does not match the question's declared kind.
    #[error("answer for question {question} must be {expected}")]
    AnswerTypeMismatch {
        /// Question the answer was submitted for.
        question: String,
        /// Human-readable description of the expected value shape.
        expected: &'static str,
    },

    /// Choice answer references a choice the question does not offer.
    #[error("question {question} has no choice {choice:?}")]
    UnknownChoice {
        /// Question the answer was submitted for.
        question: String,
        /// The offending choice.
        choice: String,
    },

    /// Date-range answer with `start` after `end`.
    #[error("date range for question {question} ends before it starts")]
    InvalidDateRange {
        /// Question the answer was submitted for.
        question: String,
    },

    /// Two questions in one survey share an id.
    #[error("duplicate question id: {question}")]
    DuplicateQuestion {
        /// The repeated question id.
        question: String,
    },

    /// Two options in one voting session share an id.
    #[error("duplicate option id: {option}")]
    DuplicateOption {
        /// The repeated option id.
        option: String,
    },

    /// Vote cast for an option the session does not have.
    #[error("unknown option: {option}")]
    UnknownOption {
        /// Option id supplied by the caller.
        option: String,
    },

    /// Voting session created without any options.
    #[error("voting session needs at least one option")]
    NoOptions,

    /// Invite call with an empty email list.
    #[error("no invitation recipients supplied")]
    NoRecipients,

    // ═══════════════════════════════════════════════════════════
    // Throttling
    // ═══════════════════════════════════════════════════════════

    /// Inviter exceeded the invite-batch rate limit.
    #[error("too many invites, please retry after {retry_after:?}")]
    RateLimited {
        /// Duration to wait before retrying.
        retry_after: std::time::Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // Collaborator faults
    // ═══════════════════════════════════════════════════════════

    /// Persistent store operation failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal invariant violation (should not be exposed to users).
    #[error("internal error")]
    Internal,
}

impl CoordinationError {
    /// Returns `true` if this error is due to invalid caller input rather
    /// than system state or collaborator failure.
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownQuestion { .. }
                | Self::AnswerTypeMismatch { .. }
                | Self::UnknownChoice { .. }
                | Self::InvalidDateRange { .. }
                | Self::DuplicateQuestion { .. }
                | Self::DuplicateOption { .. }
                | Self::UnknownOption { .. }
                | Self::NoOptions
                | Self::NoRecipients
        )
    }

    /// Returns `true` if the failure is transient and the same call may
    /// succeed if retried later.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Storage(_))
    }
}
