//! In-memory coordination store for testing.

use crate::error::{CoordinationError, Result};
use crate::providers::{
    CoordinationStore, InvitationWrite, MembershipDirectory, PendingWrite, SubmissionOutcome,
    TripStatusUpdate,
};
use crate::state::{
    Invitation, InvitationStatus, Membership, PendingInvitation, Role, SessionId, SessionStatus,
    Survey, SurveyId, SurveyResponse, SurveyStatus, Trip, TripId, TripStatus, UserId, Vote,
    VotingSession,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    trips: HashMap<TripId, Trip>,
    memberships: BTreeMap<(TripId, UserId), Membership>,
    invitations: HashMap<(TripId, UserId), Invitation>,
    pending: BTreeMap<(String, TripId), PendingInvitation>,
    surveys: HashMap<SurveyId, Survey>,
    responses: BTreeMap<(SurveyId, UserId), SurveyResponse>,
    sessions: HashMap<SessionId, VotingSession>,
    votes: BTreeMap<(SessionId, UserId, String), Vote>,
}

/// In-memory coordination store.
///
/// One mutex guards all collections, which trivially gives the
/// submit-recount-close sequences the atomicity the
/// [`CoordinationStore`] contract demands. It also implements
/// [`MembershipDirectory`], so the same instance can back both the
/// storage and membership seams of a test environment.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| CoordinationError::Internal)
    }

    /// Seed a trip.
    ///
    /// # Errors
    ///
    /// Returns error if the store mutex is poisoned.
    pub fn seed_trip(&self, trip: Trip) -> Result<()> {
        self.lock()?.trips.insert(trip.id, trip);
        Ok(())
    }

    /// Seed a membership.
    ///
    /// # Errors
    ///
    /// Returns error if the store mutex is poisoned.
    pub fn seed_membership(&self, membership: Membership) -> Result<()> {
        self.lock()?
            .memberships
            .insert((membership.trip_id, membership.user_id), membership);
        Ok(())
    }

    /// Number of pending-invitation rows across all emails.
    ///
    /// # Errors
    ///
    /// Returns error if the store mutex is poisoned.
    pub fn pending_invitation_count(&self) -> Result<usize> {
        Ok(self.lock()?.pending.len())
    }

    /// Number of vote rows for a session.
    ///
    /// # Errors
    ///
    /// Returns error if the store mutex is poisoned.
    pub fn vote_row_count(&self, session_id: SessionId) -> Result<usize> {
        Ok(self
            .lock()?
            .votes
            .keys()
            .filter(|(sid, _, _)| *sid == session_id)
            .count())
    }
}

impl CoordinationStore for InMemoryStore {
    async fn trip(&self, trip_id: TripId) -> Result<Option<Trip>> {
        Ok(self.lock()?.trips.get(&trip_id).cloned())
    }

    async fn update_trip_status(
        &self,
        trip_id: TripId,
        expected: TripStatus,
        to: TripStatus,
    ) -> Result<TripStatusUpdate> {
        let mut inner = self.lock()?;
        let Some(trip) = inner.trips.get_mut(&trip_id) else {
            return Ok(TripStatusUpdate::Skipped { current: None });
        };
        if trip.status != expected {
            return Ok(TripStatusUpdate::Skipped {
                current: Some(trip.status),
            });
        }
        let from = trip.status;
        trip.status = to;
        Ok(TripStatusUpdate::Applied { from })
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<()> {
        self.lock()?
            .memberships
            .insert((membership.trip_id, membership.user_id), membership.clone());
        Ok(())
    }

    async fn invitation(&self, trip_id: TripId, user_id: UserId) -> Result<Option<Invitation>> {
        Ok(self.lock()?.invitations.get(&(trip_id, user_id)).cloned())
    }

    async fn upsert_invitation(&self, candidate: &Invitation) -> Result<InvitationWrite> {
        let mut inner = self.lock()?;
        let key = (candidate.trip_id, candidate.user_id);
        match inner.invitations.get_mut(&key) {
            None => {
                inner.invitations.insert(key, candidate.clone());
                Ok(InvitationWrite {
                    invitation: candidate.clone(),
                    created: true,
                })
            }
            Some(existing) => {
                match existing.status {
                    InvitationStatus::Pending => {
                        // Refresh: extend the deadline, never shorten it.
                        existing.expires_at = existing.expires_at.max(candidate.expires_at);
                        existing.invited_by = candidate.invited_by;
                    }
                    InvitationStatus::Declined | InvitationStatus::Expired => {
                        // A fresh invitation replaces the stale answer.
                        *existing = candidate.clone();
                    }
                    InvitationStatus::Accepted => {}
                }
                Ok(InvitationWrite {
                    invitation: existing.clone(),
                    created: false,
                })
            }
        }
    }

    async fn set_invitation_status(
        &self,
        trip_id: TripId,
        user_id: UserId,
        status: InvitationStatus,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        let invitation = inner
            .invitations
            .get_mut(&(trip_id, user_id))
            .ok_or(CoordinationError::InvitationNotFound)?;
        invitation.status = status;
        Ok(())
    }

    async fn upsert_pending_invitation(
        &self,
        candidate: &PendingInvitation,
    ) -> Result<PendingWrite> {
        let mut inner = self.lock()?;
        let key = (candidate.email.clone(), candidate.trip_id);
        match inner.pending.get_mut(&key) {
            None => {
                inner.pending.insert(key, candidate.clone());
                Ok(PendingWrite {
                    pending: candidate.clone(),
                    created: true,
                })
            }
            Some(existing) => {
                existing.expires_at = existing.expires_at.max(candidate.expires_at);
                existing.invited_by = candidate.invited_by;
                Ok(PendingWrite {
                    pending: existing.clone(),
                    created: false,
                })
            }
        }
    }

    async fn pending_invitations_for(&self, email: &str) -> Result<Vec<PendingInvitation>> {
        Ok(self
            .lock()?
            .pending
            .values()
            .filter(|row| row.email == email)
            .cloned()
            .collect())
    }

    async fn delete_pending_invitation(&self, email: &str, trip_id: TripId) -> Result<bool> {
        Ok(self
            .lock()?
            .pending
            .remove(&(email.to_string(), trip_id))
            .is_some())
    }

    async fn insert_survey(&self, survey: &Survey) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.surveys.values().any(|s| s.trip_id == survey.trip_id) {
            return Err(CoordinationError::SurveyAlreadyExists);
        }
        inner.surveys.insert(survey.id, survey.clone());
        Ok(())
    }

    async fn survey_for_trip(&self, trip_id: TripId) -> Result<Option<Survey>> {
        Ok(self
            .lock()?
            .surveys
            .values()
            .find(|s| s.trip_id == trip_id)
            .cloned())
    }

    async fn close_survey(&self, survey_id: SurveyId) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.surveys.get_mut(&survey_id) {
            Some(survey) if survey.status == SurveyStatus::Active => {
                survey.status = SurveyStatus::Closed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_response(
        &self,
        response: &SurveyResponse,
        quorum: u32,
    ) -> Result<SubmissionOutcome> {
        // Upsert, recount, conditionally close under one lock: the whole
        // sequence is atomic with respect to concurrent submissions.
        let mut inner = self.lock()?;
        {
            let survey = inner
                .surveys
                .get(&response.survey_id)
                .ok_or(CoordinationError::SurveyNotFound)?;
            if survey.status != SurveyStatus::Active {
                return Err(CoordinationError::SurveyNotActive);
            }
        }

        inner
            .responses
            .insert((response.survey_id, response.user_id), response.clone());

        #[allow(clippy::cast_possible_truncation)]
        let participants = inner
            .responses
            .keys()
            .filter(|(sid, _)| *sid == response.survey_id)
            .count() as u32;

        let closed = participants >= quorum;
        if closed {
            if let Some(survey) = inner.surveys.get_mut(&response.survey_id) {
                survey.status = SurveyStatus::Closed;
            }
        }

        Ok(SubmissionOutcome {
            participants,
            closed,
        })
    }

    async fn insert_voting_session(&self, session: &VotingSession) -> Result<()> {
        self.lock()?.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn voting_session(&self, session_id: SessionId) -> Result<Option<VotingSession>> {
        Ok(self.lock()?.sessions.get(&session_id).cloned())
    }

    async fn close_voting_session(&self, session_id: SessionId) -> Result<bool> {
        let mut inner = self.lock()?;
        match inner.sessions.get_mut(&session_id) {
            Some(session) if session.status == SessionStatus::Active => {
                session.status = SessionStatus::Closed;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_vote(&self, vote: &Vote, quorum: u32) -> Result<SubmissionOutcome> {
        let mut inner = self.lock()?;
        {
            let session = inner
                .sessions
                .get(&vote.session_id)
                .ok_or(CoordinationError::SessionNotFound)?;
            if session.status != SessionStatus::Active {
                return Err(CoordinationError::SessionNotActive);
            }
        }

        inner.votes.insert(
            (vote.session_id, vote.voter_id, vote.option_id.clone()),
            vote.clone(),
        );

        let voters: HashSet<UserId> = inner
            .votes
            .keys()
            .filter(|(sid, _, _)| *sid == vote.session_id)
            .map(|(_, voter, _)| *voter)
            .collect();
        #[allow(clippy::cast_possible_truncation)]
        let participants = voters.len() as u32;

        let closed = participants >= quorum;
        if closed {
            if let Some(session) = inner.sessions.get_mut(&vote.session_id) {
                session.status = SessionStatus::Closed;
            }
        }

        Ok(SubmissionOutcome {
            participants,
            closed,
        })
    }

    async fn votes_for_session(&self, session_id: SessionId) -> Result<Vec<Vote>> {
        Ok(self
            .lock()?
            .votes
            .values()
            .filter(|vote| vote.session_id == session_id)
            .cloned()
            .collect())
    }
}

impl MembershipDirectory for InMemoryStore {
    async fn count_members(&self, trip_id: TripId) -> Result<u32> {
        #[allow(clippy::cast_possible_truncation)]
        let count = self
            .lock()?
            .memberships
            .keys()
            .filter(|(tid, _)| *tid == trip_id)
            .count() as u32;
        Ok(count)
    }

    async fn role_of(&self, trip_id: TripId, user_id: UserId) -> Result<Option<Role>> {
        Ok(self
            .lock()?
            .memberships
            .get(&(trip_id, user_id))
            .map(|m| m.role))
    }

    async fn members_of(&self, trip_id: TripId) -> Result<Vec<Membership>> {
        Ok(self
            .lock()?
            .memberships
            .values()
            .filter(|m| m.trip_id == trip_id)
            .cloned()
            .collect())
    }
}
