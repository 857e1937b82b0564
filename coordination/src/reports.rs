//! Result types returned by engine operations.
//!
//! Primary outcomes and advisory side-effect outcomes are kept separate:
//! a report tells the caller what the operation did, and what happened to
//! any best-effort side effect (status transition, email delivery), without
//! ever failing the primary operation over the side effect.

use crate::error::CoordinationError;
use crate::state::{
    Invitation, Membership, PendingInvitation, SessionStatus, Survey, TripStatus, UserId,
    VoteOption, VotingSession,
};
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════
// Advisory status transitions
// ═══════════════════════════════════════════════════════════════════════

/// Outcome of an advisory trip-status transition.
///
/// Status updates are fire-and-forget: a missing trip or an unmet
/// precondition skips the update without failing the operation that
/// triggered it. The outcome is still reported so callers and tests can
/// assert the primary result independently of the side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChange {
    /// The transition applied.
    Applied {
        /// Status before the transition.
        from: TripStatus,
        /// Status after the transition.
        to: TripStatus,
    },

    /// The transition did not apply (trip missing, already past the target
    /// stage, terminal status, or lost a concurrent race).
    Skipped {
        /// Observed status, if the trip exists.
        current: Option<TripStatus>,
    },

    /// The store failed while updating; logged, never propagated.
    Failed,
}

// ═══════════════════════════════════════════════════════════════════════
// Invitations
// ═══════════════════════════════════════════════════════════════════════

/// Advisory outcome of one invitation email delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// The mailer accepted and delivered the message.
    Sent,

    /// The mailer queued the message for later delivery.
    Queued,

    /// The mailer failed; the invitation record persists regardless.
    Failed,
}

/// Per-email outcome of an [`invite`](crate::InvitationReconciler::invite)
/// call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InviteOutcome {
    /// The email resolves to an account that is already a trip member;
    /// nothing was mutated.
    AlreadyMember {
        /// The invited email.
        email: String,
        /// The member's account.
        user_id: UserId,
    },

    /// The email resolves to an account; a durable invitation was created
    /// or its deadline refreshed.
    Invited {
        /// The invited email.
        email: String,
        /// The invitation row as persisted.
        invitation: Invitation,
        /// `true` when an existing pending invitation was refreshed rather
        /// than a new one created.
        renewed: bool,
    },

    /// No account exists for the email; a pending invitation was created
    /// or refreshed and an email invitation was attempted.
    AwaitingAccount {
        /// The invited email.
        email: String,
        /// The pending invitation row as persisted.
        pending: PendingInvitation,
        /// `true` when an existing row was refreshed.
        renewed: bool,
        /// Advisory email-delivery outcome.
        delivery: Delivery,
    },
}

impl InviteOutcome {
    /// The email this outcome is about.
    #[must_use]
    pub fn email(&self) -> &str {
        match self {
            Self::AlreadyMember { email, .. }
            | Self::Invited { email, .. }
            | Self::AwaitingAccount { email, .. } => email,
        }
    }

    /// Returns `true` if this outcome created or refreshed an invitation.
    #[must_use]
    pub const fn issued(&self) -> bool {
        matches!(self, Self::Invited { .. } | Self::AwaitingAccount { .. })
    }
}

/// A per-email failure inside an invite batch.
///
/// One email's failure never aborts the rest of the batch; it is captured
/// here alongside the other emails' outcomes.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteFailure {
    /// The email that failed.
    pub email: String,

    /// Why it failed.
    pub error: CoordinationError,
}

/// Result of an invite batch: per-email outcomes, isolated failures, and
/// the advisory lifecycle transition.
#[derive(Debug, Clone, PartialEq)]
pub struct InviteReport {
    /// Outcomes for the emails that processed cleanly.
    pub outcomes: Vec<InviteOutcome>,

    /// Per-email failures.
    pub errors: Vec<InviteFailure>,

    /// Advisory `Planning → Inviting` transition outcome.
    pub lifecycle: StatusChange,
}

/// Result of promoting pending invitations after an account was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionReport {
    /// Durable invitations created by the promotion.
    pub promoted: Vec<Invitation>,

    /// Pending rows skipped because they had already expired.
    pub expired: u32,

    /// Rows that failed to promote; logged and left for the next attempt.
    pub failed: u32,
}

/// Result of an invitee answering a durable invitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InvitationDecision {
    /// The invitee joined the trip.
    Accepted {
        /// The membership created by the acceptance.
        membership: Membership,
    },

    /// The invitee declined.
    Declined,
}

// ═══════════════════════════════════════════════════════════════════════
// Surveys
// ═══════════════════════════════════════════════════════════════════════

/// Result of opening a survey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyCreated {
    /// The survey as persisted.
    pub survey: Survey,

    /// Advisory `→ Surveying` transition outcome.
    pub lifecycle: StatusChange,
}

/// Result of recording a survey response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecorded {
    /// Distinct members who have responded, after this submission.
    pub respondents: u32,

    /// Trip member count used as the quorum denominator.
    pub member_count: u32,

    /// `true` when this submission closed the survey.
    pub closed: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// Voting
// ═══════════════════════════════════════════════════════════════════════

/// Result of opening a voting session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCreated {
    /// The session as persisted.
    pub session: VotingSession,

    /// Advisory `→ Voting` transition outcome.
    pub lifecycle: StatusChange,
}

/// Result of casting a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteRecorded {
    /// Distinct voters who have participated, after this cast.
    pub voters: u32,

    /// Trip member count used as the quorum denominator.
    pub member_count: u32,

    /// `true` when this cast closed the session.
    pub closed: bool,
}

/// One option's line in a tally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyEntry {
    /// The option.
    pub option: VoteOption,

    /// Number of vote rows for the option.
    pub votes: u32,

    /// `round(votes / total_votes × 100)`; 0 when no votes were cast.
    pub percent: u8,
}

/// Derived results of a voting session. Never persisted.
///
/// Entries are ordered by descending vote count; ties keep the options'
/// declared order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tally {
    /// Session status as observed by this read (after lazy expiry).
    pub status: SessionStatus,

    /// Total vote rows across all options.
    pub total_votes: u32,

    /// Distinct voters who participated.
    pub voters: u32,

    /// Per-option results, best first.
    pub entries: Vec<TallyEntry>,
}
