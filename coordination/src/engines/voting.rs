//! Voting engine.
//!
//! Owns the voting sessions of a trip. Each session is `Active` until it
//! closes, either by quorum (every member has cast at least one vote) or by
//! its deadline. Expiry is discovered lazily: there is no timer, the next
//! access past `expires_at` closes the session. Both writes (`cast_vote`)
//! and reads (`tally`) apply the check, so a session that merely stops
//! receiving votes does not linger as `Active`.
//!
//! Vote rows are keyed `(session_id, voter_id, option_id)`: recasting an
//! option updates its rank, voting a second option adds a row. One storage
//! shape covers single-choice, multi-select, and ranked sessions, at the
//! price of counting *distinct voters* (never rows) for quorum and turnout.

use crate::engines::lifecycle::{LifecycleEvent, advance_trip_status};
use crate::engines::notify_quietly;
use crate::environment::CoordinationEnvironment;
use crate::error::{CoordinationError, Result};
use crate::providers::{
    AccountDirectory, Clock, CoordinationStore, InvitationMailer, MembershipDirectory,
    Notification, NotificationKind, NotificationSink, ThrottleStore,
};
use crate::reports::{SessionCreated, Tally, TallyEntry, VoteRecorded};
use crate::state::{
    Role, SessionId, SessionKind, SessionStatus, TripId, UserId, Vote, VoteOption, VotingSession,
};
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use tracing::{info, instrument};

/// Voting engine.
///
/// See the [module docs](self) for the state machine.
#[derive(Clone)]
pub struct VotingEngine<S, M, A, E, N, T, C>
where
    S: CoordinationStore + Clone,
    M: MembershipDirectory + Clone,
    A: AccountDirectory + Clone,
    E: InvitationMailer + Clone,
    N: NotificationSink + Clone,
    T: ThrottleStore + Clone,
    C: Clock + Clone,
{
    env: CoordinationEnvironment<S, M, A, E, N, T, C>,
}

impl<S, M, A, E, N, T, C> VotingEngine<S, M, A, E, N, T, C>
where
    S: CoordinationStore + Clone,
    M: MembershipDirectory + Clone,
    A: AccountDirectory + Clone,
    E: InvitationMailer + Clone,
    N: NotificationSink + Clone,
    T: ThrottleStore + Clone,
    C: Clock + Clone,
{
    /// Create a voting engine.
    #[must_use]
    pub const fn new(env: CoordinationEnvironment<S, M, A, E, N, T, C>) -> Self {
        Self { env }
    }

    /// Open a voting session.
    ///
    /// Option ids must be unique within the session. On success the trip
    /// status moves to `Voting` (advisory) and every other member is
    /// notified. A trip may run any number of sessions.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The trip does not exist → `CoordinationError::TripNotFound`
    /// - The actor is not a member → `CoordinationError::NotAMember`
    /// - The actor is a plain member → `CoordinationError::Unauthorized`
    /// - `options` is empty → `CoordinationError::NoOptions`
    /// - Option ids collide → `CoordinationError::DuplicateOption`
    /// - A store write fails
    #[instrument(skip(self, title, options))]
    pub async fn create(
        &self,
        trip_id: TripId,
        actor_id: UserId,
        kind: SessionKind,
        title: impl Into<String>,
        options: Vec<VoteOption>,
        ttl: Duration,
    ) -> Result<SessionCreated> {
        self.env
            .store
            .trip(trip_id)
            .await?
            .ok_or(CoordinationError::TripNotFound)?;
        self.require_organizer(trip_id, actor_id).await?;
        validate_options(&options)?;

        let now = self.env.clock.now();
        let session = VotingSession {
            id: SessionId::new(),
            trip_id,
            kind,
            title: title.into(),
            status: SessionStatus::Active,
            options,
            created_by: actor_id,
            created_at: now,
            expires_at: now + ttl,
        };
        self.env.store.insert_voting_session(&session).await?;

        let lifecycle =
            advance_trip_status(&self.env.store, trip_id, LifecycleEvent::VotingOpened).await;
        self.notify_members(trip_id, actor_id, &session.title).await;

        info!(?trip_id, session_id = ?session.id, ?kind, "voting session opened");
        Ok(SessionCreated { session, lifecycle })
    }

    /// Cast (or recast) a vote.
    ///
    /// Recasting the same option updates its rank; casting a different
    /// option adds a row. When the distinct-voter count reaches the trip's
    /// member count, the same atomic operation closes the session.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The session does not exist → `CoordinationError::SessionNotFound`
    /// - The session is closed → `CoordinationError::SessionNotActive`
    /// - The deadline passed → `CoordinationError::SessionExpired` (the
    ///   session is closed as a side effect of this discovery)
    /// - The option is unknown → `CoordinationError::UnknownOption`
    /// - A store write fails
    #[instrument(skip(self))]
    pub async fn cast_vote(
        &self,
        session_id: SessionId,
        voter_id: UserId,
        option_id: &str,
        rank: Option<u32>,
    ) -> Result<VoteRecorded> {
        let session = self
            .env
            .store
            .voting_session(session_id)
            .await?
            .ok_or(CoordinationError::SessionNotFound)?;
        if session.status != SessionStatus::Active {
            return Err(CoordinationError::SessionNotActive);
        }

        let now = self.env.clock.now();
        if now > session.expires_at {
            // Deadline passed: close on discovery, reject the cast.
            self.env.store.close_voting_session(session_id).await?;
            info!(?session_id, "voting session expired, closed lazily");
            return Err(CoordinationError::SessionExpired);
        }

        if !session.has_option(option_id) {
            return Err(CoordinationError::UnknownOption {
                option: option_id.to_string(),
            });
        }

        let member_count = self.env.membership.count_members(session.trip_id).await?;
        let vote = Vote {
            session_id,
            voter_id,
            option_id: option_id.to_string(),
            rank,
            cast_at: now,
        };
        let outcome = self.env.store.record_vote(&vote, member_count).await?;

        if outcome.closed {
            info!(?session_id, voters = outcome.participants, "voting session closed at quorum");
        }

        Ok(VoteRecorded {
            voters: outcome.participants,
            member_count,
            closed: outcome.closed,
        })
    }

    /// Tally a session: a pure derived view, never persisted.
    ///
    /// Entries cover every option (zero-vote options included), ordered by
    /// descending vote count with ties keeping the options' declared order.
    /// Percentages are `round(count / total × 100)`, `0` when no votes were
    /// cast. The lazy-expiry check applies here too: tallying an `Active`
    /// session past its deadline closes it first.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The session does not exist → `CoordinationError::SessionNotFound`
    /// - The store fails
    #[instrument(skip(self))]
    pub async fn tally(&self, session_id: SessionId) -> Result<Tally> {
        let mut session = self
            .env
            .store
            .voting_session(session_id)
            .await?
            .ok_or(CoordinationError::SessionNotFound)?;

        if session.status == SessionStatus::Active && self.env.clock.now() > session.expires_at {
            self.env.store.close_voting_session(session_id).await?;
            session.status = SessionStatus::Closed;
        }

        let votes = self.env.store.votes_for_session(session_id).await?;
        let mut counts: HashMap<&str, u32> = HashMap::new();
        let mut voters: HashSet<UserId> = HashSet::new();
        for vote in &votes {
            *counts.entry(vote.option_id.as_str()).or_insert(0) += 1;
            voters.insert(vote.voter_id);
        }

        let total_votes = counts.values().sum::<u32>();
        let mut entries: Vec<TallyEntry> = session
            .options
            .iter()
            .map(|option| {
                let count = counts.get(option.id.as_str()).copied().unwrap_or(0);
                TallyEntry {
                    option: option.clone(),
                    votes: count,
                    percent: percent_of(count, total_votes),
                }
            })
            .collect();
        // Stable sort: ties keep the declared option order.
        entries.sort_by(|a, b| b.votes.cmp(&a.votes));

        #[allow(clippy::cast_possible_truncation)]
        let voters = voters.len() as u32;

        Ok(Tally {
            status: session.status,
            total_votes,
            voters,
            entries,
        })
    }

    /// Notify every member except the actor that the session opened.
    async fn notify_members(&self, trip_id: TripId, actor_id: UserId, title: &str) {
        let members = match self.env.membership.members_of(trip_id).await {
            Ok(members) => members,
            Err(error) => {
                tracing::warn!(?trip_id, %error, "member listing failed, notifications skipped");
                return;
            }
        };
        for member in members {
            if member.user_id == actor_id {
                continue;
            }
            notify_quietly(
                &self.env.notifications,
                Notification::for_trip(
                    member.user_id,
                    NotificationKind::VotingOpened,
                    "New vote",
                    format!("\"{title}\" is open for voting"),
                    trip_id,
                ),
            )
            .await;
        }
    }

    /// Require `actor_id` to hold an organizer role on the trip.
    async fn require_organizer(&self, trip_id: TripId, actor_id: UserId) -> Result<()> {
        match self.env.membership.role_of(trip_id, actor_id).await? {
            None => Err(CoordinationError::NotAMember),
            Some(role) if !role.can_organize() => Err(CoordinationError::Unauthorized {
                required: Role::Admin,
            }),
            Some(_) => Ok(()),
        }
    }
}

/// Reject empty option lists and duplicate option ids.
fn validate_options(options: &[VoteOption]) -> Result<()> {
    if options.is_empty() {
        return Err(CoordinationError::NoOptions);
    }
    let mut seen = HashSet::new();
    for option in options {
        if !seen.insert(option.id.as_str()) {
            return Err(CoordinationError::DuplicateOption {
                option: option.id.clone(),
            });
        }
    }
    Ok(())
}

/// `round(count / total × 100)` as a whole percentage; `0` when `total` is 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent_of(count: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    ((f64::from(count) / f64::from(total)) * 100.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str) -> VoteOption {
        VoteOption {
            id: id.to_string(),
            title: id.to_string(),
            description: None,
        }
    }

    #[test]
    fn duplicate_option_ids_rejected() {
        assert_eq!(
            validate_options(&[option("a"), option("b"), option("a")]),
            Err(CoordinationError::DuplicateOption {
                option: "a".to_string(),
            })
        );
        assert!(validate_options(&[option("a"), option("b")]).is_ok());
    }

    #[test]
    fn empty_option_list_rejected() {
        assert_eq!(validate_options(&[]), Err(CoordinationError::NoOptions));
    }

    #[test]
    fn percentages_round_half_up_and_handle_zero() {
        assert_eq!(percent_of(0, 0), 0);
        assert_eq!(percent_of(2, 3), 67);
        assert_eq!(percent_of(1, 3), 33);
        assert_eq!(percent_of(3, 7), 43);
        assert_eq!(percent_of(1, 7), 14);
        assert_eq!(percent_of(7, 7), 100);
    }
}
