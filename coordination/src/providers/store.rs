//! Coordination store trait.

use crate::error::Result;
use crate::state::{
    Invitation, InvitationStatus, Membership, PendingInvitation, SessionId, Survey,
    SurveyId, SurveyResponse, TripId, TripStatus, Trip, UserId, Vote, VotingSession,
};
use serde::{Deserialize, Serialize};

/// Result of an atomic submit-and-recount operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Distinct participants (respondents or voters) after the write.
    pub participants: u32,

    /// `true` when this write closed the survey/session by reaching quorum.
    pub closed: bool,
}

/// Result of an invitation upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvitationWrite {
    /// The row as persisted after the upsert.
    pub invitation: Invitation,

    /// `true` when a new row was inserted, `false` when an existing row was
    /// refreshed.
    pub created: bool,
}

/// Result of a pending-invitation upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingWrite {
    /// The row as persisted after the upsert.
    pub pending: PendingInvitation,

    /// `true` when a new row was inserted, `false` when an existing row was
    /// refreshed.
    pub created: bool,
}

/// Result of a compare-and-set trip status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TripStatusUpdate {
    /// The status matched `expected` and was replaced.
    Applied {
        /// Status before the update.
        from: TripStatus,
    },

    /// The update did not apply.
    Skipped {
        /// Observed status, if the trip exists.
        current: Option<TripStatus>,
    },
}

/// Durable storage for all coordination entities.
///
/// # Atomicity contract
///
/// [`record_response`](CoordinationStore::record_response) and
/// [`record_vote`](CoordinationStore::record_vote) each execute
/// *upsert → recount distinct participants → close if count ≥ quorum* as a
/// single atomic unit scoped to the survey/session id. Two concurrent
/// submissions must serialize through that unit, so at most one of them
/// observes `closed == true` and the close fires exactly when the true
/// participant count first reaches quorum.
///
/// Uniqueness is enforced by the store under the keys `(trip_id, user_id)`
/// for invitations, `(email, trip_id)` for pending invitations,
/// `(survey_id, user_id)` for responses, and
/// `(session_id, voter_id, option_id)` for votes. All writes are upserts
/// under those keys, never insert-then-check.
pub trait CoordinationStore: Send + Sync {
    // ═══════════════════════════════════════════════════════════════════════
    // Trips
    // ═══════════════════════════════════════════════════════════════════════

    /// Load a trip.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn trip(&self, trip_id: TripId) -> Result<Option<Trip>>;

    /// Compare-and-set the trip status: apply `to` only while the current
    /// status equals `expected`.
    ///
    /// A missing trip or a mismatched current status is reported as
    /// [`TripStatusUpdate::Skipped`], not as an error; lifecycle updates
    /// are advisory.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn update_trip_status(
        &self,
        trip_id: TripId,
        expected: TripStatus,
        to: TripStatus,
    ) -> Result<TripStatusUpdate>;

    // ═══════════════════════════════════════════════════════════════════════
    // Memberships
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a membership created by an accepted invitation. Idempotent
    /// under the `(trip_id, user_id)` key.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn insert_membership(&self, membership: &Membership) -> Result<()>;

    // ═══════════════════════════════════════════════════════════════════════
    // Invitations
    // ═══════════════════════════════════════════════════════════════════════

    /// Load a durable invitation.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn invitation(&self, trip_id: TripId, user_id: UserId) -> Result<Option<Invitation>>;

    /// Insert-or-refresh a durable invitation under `(trip_id, user_id)`.
    ///
    /// - No row: insert `candidate` as-is.
    /// - Existing `Pending` row: keep its `created_at`, extend `expires_at`
    ///   to the later of the two deadlines (extend, never shorten).
    /// - Existing `Declined`/`Expired` row: replace with `candidate`
    ///   (a fresh `Pending` invitation).
    /// - Existing `Accepted` row: return it unchanged.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn upsert_invitation(&self, candidate: &Invitation) -> Result<InvitationWrite>;

    /// Set the status of a durable invitation.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The row does not exist → `CoordinationError::InvitationNotFound`
    /// - The write fails
    async fn set_invitation_status(
        &self,
        trip_id: TripId,
        user_id: UserId,
        status: InvitationStatus,
    ) -> Result<()>;

    // ═══════════════════════════════════════════════════════════════════════
    // Pending invitations
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert-or-refresh a pending invitation under `(email, trip_id)`,
    /// with the same extend-never-shorten deadline rule as
    /// [`upsert_invitation`](CoordinationStore::upsert_invitation).
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn upsert_pending_invitation(
        &self,
        candidate: &PendingInvitation,
    ) -> Result<PendingWrite>;

    /// All pending invitations for an email, across trips. The caller
    /// filters out expired rows.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn pending_invitations_for(&self, email: &str) -> Result<Vec<PendingInvitation>>;

    /// Delete one pending invitation.
    ///
    /// # Returns
    ///
    /// `true` if a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn delete_pending_invitation(&self, email: &str, trip_id: TripId) -> Result<bool>;

    // ═══════════════════════════════════════════════════════════════════════
    // Surveys
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a survey.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The trip already has a survey (any status) →
    ///   `CoordinationError::SurveyAlreadyExists`
    /// - The write fails
    async fn insert_survey(&self, survey: &Survey) -> Result<()>;

    /// Load the trip's survey, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn survey_for_trip(&self, trip_id: TripId) -> Result<Option<Survey>>;

    /// Close a survey.
    ///
    /// # Returns
    ///
    /// `true` if the survey was active and is now closed; `false` if it was
    /// already closed or does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn close_survey(&self, survey_id: SurveyId) -> Result<bool>;

    /// Atomically upsert a response, recount distinct respondents, and
    /// close the survey when the count reaches `quorum`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The survey does not exist → `CoordinationError::SurveyNotFound`
    /// - The survey is closed → `CoordinationError::SurveyNotActive`
    /// - The write fails
    async fn record_response(
        &self,
        response: &SurveyResponse,
        quorum: u32,
    ) -> Result<SubmissionOutcome>;

    // ═══════════════════════════════════════════════════════════════════════
    // Voting sessions
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert a voting session.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn insert_voting_session(&self, session: &VotingSession) -> Result<()>;

    /// Load a voting session.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn voting_session(&self, session_id: SessionId) -> Result<Option<VotingSession>>;

    /// Close a voting session.
    ///
    /// # Returns
    ///
    /// `true` if the session was active and is now closed; `false` if it
    /// was already closed or does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the write fails.
    async fn close_voting_session(&self, session_id: SessionId) -> Result<bool>;

    /// Atomically upsert a vote under `(session_id, voter_id, option_id)`,
    /// recount distinct voters, and close the session when the count
    /// reaches `quorum`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The session does not exist → `CoordinationError::SessionNotFound`
    /// - The session is closed → `CoordinationError::SessionNotActive`
    /// - The write fails
    async fn record_vote(&self, vote: &Vote, quorum: u32) -> Result<SubmissionOutcome>;

    /// All vote rows of a session.
    ///
    /// # Errors
    ///
    /// Returns error if the query fails.
    async fn votes_for_session(&self, session_id: SessionId) -> Result<Vec<Vote>>;
}
