//! Invitation reconciler.
//!
//! Resolves invited email addresses against the account directory:
//!
//! - email has an account → a durable [`Invitation`] keyed by
//!   `(trip_id, user_id)` plus an in-app notification;
//! - email has no account → a time-limited [`PendingInvitation`] keyed by
//!   `(email, trip_id)` plus an advisory email send.
//!
//! The two shapes never coexist for the same `(trip, identity)`: the moment
//! an account is created for an email, [`promote_pending`] converts every
//! non-expired pending row into a durable invitation and deletes it.
//!
//! Batch processing is per-email independent: one email's failure is
//! captured in the report's `errors` list and the rest of the batch
//! proceeds.
//!
//! [`promote_pending`]: InvitationReconciler::promote_pending

use crate::config::InvitationConfig;
use crate::engines::lifecycle::{LifecycleEvent, advance_trip_status};
use crate::engines::notify_quietly;
use crate::environment::CoordinationEnvironment;
use crate::error::{CoordinationError, Result};
use crate::providers::{
    AccountDirectory, Clock, CoordinationStore, InvitationEmail, InvitationMailer,
    MembershipDirectory, Notification, NotificationKind, NotificationSink, ThrottleStore,
};
use crate::reports::{
    Delivery, InvitationDecision, InviteFailure, InviteOutcome, InviteReport, PromotionReport,
    StatusChange,
};
use crate::state::{
    Invitation, InvitationStatus, Membership, PendingInvitation, Role, Trip, TripId, UserId,
};
use chrono::Duration;
use tracing::{info, instrument, warn};

/// Fallback inviter label when the inviter has no resolvable account.
const UNKNOWN_INVITER: &str = "A trip organizer";

/// Invitation reconciler.
///
/// See the [module docs](self) for the reconciliation rules.
#[derive(Clone)]
pub struct InvitationReconciler<S, M, A, E, N, T, C>
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
    config: InvitationConfig,
}

impl<S, M, A, E, N, T, C> InvitationReconciler<S, M, A, E, N, T, C>
where
    S: CoordinationStore + Clone,
    M: MembershipDirectory + Clone,
    A: AccountDirectory + Clone,
    E: InvitationMailer + Clone,
    N: NotificationSink + Clone,
    T: ThrottleStore + Clone,
    C: Clock + Clone,
{
    /// Create a reconciler with the default [`InvitationConfig`].
    #[must_use]
    pub fn new(env: CoordinationEnvironment<S, M, A, E, N, T, C>) -> Self {
        Self {
            env,
            config: InvitationConfig::default(),
        }
    }

    /// Create a reconciler with a custom configuration.
    #[must_use]
    pub const fn with_config(
        env: CoordinationEnvironment<S, M, A, E, N, T, C>,
        config: InvitationConfig,
    ) -> Self {
        Self { env, config }
    }

    /// The active configuration (default TTL and throttle limits).
    #[must_use]
    pub const fn config(&self) -> &InvitationConfig {
        &self.config
    }

    /// Invite a batch of email addresses to a trip.
    ///
    /// Each email is processed independently; per-email failures land in
    /// the report's `errors` list without aborting the rest. Email delivery
    /// for pending invitations is advisory: the invitation record persists
    /// whether or not the mail goes out. On the first successful invitation
    /// of a trip still in `Planning`, the trip advances to `Inviting`
    /// (best-effort, reported in `lifecycle`).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `emails` is empty → `CoordinationError::NoRecipients`
    /// - The trip does not exist → `CoordinationError::TripNotFound`
    /// - The inviter is not a member → `CoordinationError::NotAMember`
    /// - The inviter is a plain member → `CoordinationError::Unauthorized`
    /// - The inviter exceeded the batch throttle →
    ///   `CoordinationError::RateLimited`
    /// - The membership or account lookup fails before any email is
    ///   processed
    #[instrument(skip(self, emails), fields(batch = emails.len()))]
    pub async fn invite(
        &self,
        trip_id: TripId,
        inviter_id: UserId,
        emails: &[String],
        ttl: Duration,
    ) -> Result<InviteReport> {
        if emails.is_empty() {
            return Err(CoordinationError::NoRecipients);
        }

        let trip = self
            .env
            .store
            .trip(trip_id)
            .await?
            .ok_or(CoordinationError::TripNotFound)?;
        self.require_organizer(trip_id, inviter_id).await?;

        self.env
            .throttle
            .check_and_record(
                &inviter_id.0.to_string(),
                self.config.max_batches_per_window,
                self.config.throttle_window,
            )
            .await?;

        let inviter_name = match self.env.accounts.account(inviter_id).await? {
            Some(account) => account.label().to_string(),
            None => UNKNOWN_INVITER.to_string(),
        };

        let mut outcomes = Vec::new();
        let mut errors = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for raw in emails {
            let email = raw.trim().to_lowercase();
            if email.is_empty() || !seen.insert(email.clone()) {
                continue;
            }
            match self
                .invite_one(&trip, inviter_id, &inviter_name, &email, ttl)
                .await
            {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    warn!(%email, %error, "invitation failed for one recipient");
                    errors.push(InviteFailure { email, error });
                }
            }
        }

        let lifecycle = if outcomes.iter().any(InviteOutcome::issued) {
            advance_trip_status(&self.env.store, trip_id, LifecycleEvent::InvitationIssued).await
        } else {
            StatusChange::Skipped {
                current: Some(trip.status),
            }
        };

        info!(
            ?trip_id,
            invited = outcomes.len(),
            failed = errors.len(),
            "invite batch processed"
        );

        Ok(InviteReport {
            outcomes,
            errors,
            lifecycle,
        })
    }

    /// Process a single email within an invite batch.
    async fn invite_one(
        &self,
        trip: &Trip,
        inviter_id: UserId,
        inviter_name: &str,
        email: &str,
        ttl: Duration,
    ) -> Result<InviteOutcome> {
        let now = self.env.clock.now();
        let expires_at = now + ttl;

        if let Some(account) = self.env.accounts.find_by_email(email).await? {
            // The email belongs to an account: durable invitation path.
            if self
                .env
                .membership
                .role_of(trip.id, account.user_id)
                .await?
                .is_some()
            {
                return Ok(InviteOutcome::AlreadyMember {
                    email: email.to_string(),
                    user_id: account.user_id,
                });
            }

            let candidate = Invitation {
                trip_id: trip.id,
                user_id: account.user_id,
                invited_by: inviter_id,
                status: InvitationStatus::Pending,
                created_at: now,
                expires_at,
            };
            let write = self.env.store.upsert_invitation(&candidate).await?;

            notify_quietly(
                &self.env.notifications,
                Notification::for_trip(
                    account.user_id,
                    NotificationKind::TripInvite,
                    "Trip invitation",
                    format!("{inviter_name} invited you to \"{}\"", trip.title),
                    trip.id,
                ),
            )
            .await;

            return Ok(InviteOutcome::Invited {
                email: email.to_string(),
                invitation: write.invitation,
                renewed: !write.created,
            });
        }

        // No account: pending invitation, then an advisory email send. The
        // record is durable before the send is attempted.
        let candidate = PendingInvitation {
            email: email.to_string(),
            trip_id: trip.id,
            invited_by: inviter_id,
            created_at: now,
            expires_at,
        };
        let write = self.env.store.upsert_pending_invitation(&candidate).await?;

        let delivery = match self
            .env
            .mailer
            .send_invitation(&InvitationEmail {
                to: email.to_string(),
                trip_title: trip.title.clone(),
                inviter_name: inviter_name.to_string(),
                trip_id: trip.id,
                expires_at: write.pending.expires_at,
            })
            .await
        {
            Ok(delivery) => delivery,
            Err(error) => {
                warn!(%email, %error, "invitation email failed, record kept");
                Delivery::Failed
            }
        };

        Ok(InviteOutcome::AwaitingAccount {
            email: email.to_string(),
            pending: write.pending,
            renewed: !write.created,
            delivery,
        })
    }

    /// Promote every non-expired pending invitation for `email` into a
    /// durable invitation for the freshly created account `new_user_id`.
    ///
    /// Each row is processed independently: the durable invitation is
    /// upserted, the invitee notified, then the pending row deleted. A
    /// failing row is logged, counted, and left for a later retry; since
    /// promotion deletes its source, replaying the whole call is a no-op.
    ///
    /// # Errors
    ///
    /// Returns error only if the initial pending-invitation listing fails.
    #[instrument(skip(self))]
    pub async fn promote_pending(&self, email: &str, new_user_id: UserId) -> Result<PromotionReport> {
        let email = email.trim().to_lowercase();
        let rows = self.env.store.pending_invitations_for(&email).await?;
        let now = self.env.clock.now();

        let mut report = PromotionReport {
            promoted: Vec::new(),
            expired: 0,
            failed: 0,
        };

        for row in rows {
            if row.expires_at <= now {
                report.expired += 1;
                continue;
            }

            let candidate = Invitation {
                trip_id: row.trip_id,
                user_id: new_user_id,
                invited_by: row.invited_by,
                status: InvitationStatus::Pending,
                created_at: now,
                expires_at: row.expires_at,
            };

            let write = match self.env.store.upsert_invitation(&candidate).await {
                Ok(write) => write,
                Err(error) => {
                    warn!(trip_id = ?row.trip_id, %error, "pending promotion failed, row kept");
                    report.failed += 1;
                    continue;
                }
            };

            let trip_title = match self.env.store.trip(row.trip_id).await {
                Ok(Some(trip)) => trip.title,
                _ => "a trip".to_string(),
            };
            notify_quietly(
                &self.env.notifications,
                Notification::for_trip(
                    new_user_id,
                    NotificationKind::TripInvite,
                    "Trip invitation",
                    format!("You were invited to \"{trip_title}\""),
                    row.trip_id,
                ),
            )
            .await;

            match self
                .env
                .store
                .delete_pending_invitation(&email, row.trip_id)
                .await
            {
                Ok(_) => report.promoted.push(write.invitation),
                Err(error) => {
                    // The durable invitation exists; the retry will refresh
                    // it and delete the leftover row.
                    warn!(trip_id = ?row.trip_id, %error, "pending row deletion failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            %email,
            promoted = report.promoted.len(),
            expired = report.expired,
            failed = report.failed,
            "pending invitations promoted"
        );

        Ok(report)
    }

    /// Answer a durable invitation.
    ///
    /// Accepting creates the membership (role `Member`) and marks the
    /// invitation `Accepted`; declining marks it `Declined`. An invitation
    /// past its deadline is marked `Expired` on access and rejected.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - No invitation exists → `CoordinationError::InvitationNotFound`
    /// - It was already answered → `CoordinationError::InvitationNotPending`
    /// - It expired → `CoordinationError::InvitationExpired`
    /// - A store write fails
    #[instrument(skip(self))]
    pub async fn respond(
        &self,
        trip_id: TripId,
        user_id: UserId,
        accept: bool,
    ) -> Result<InvitationDecision> {
        let invitation = self
            .env
            .store
            .invitation(trip_id, user_id)
            .await?
            .ok_or(CoordinationError::InvitationNotFound)?;

        if invitation.status != InvitationStatus::Pending {
            return Err(CoordinationError::InvitationNotPending);
        }

        let now = self.env.clock.now();
        if now > invitation.expires_at {
            self.env
                .store
                .set_invitation_status(trip_id, user_id, InvitationStatus::Expired)
                .await?;
            return Err(CoordinationError::InvitationExpired);
        }

        if !accept {
            self.env
                .store
                .set_invitation_status(trip_id, user_id, InvitationStatus::Declined)
                .await?;
            return Ok(InvitationDecision::Declined);
        }

        let membership = Membership {
            trip_id,
            user_id,
            role: Role::Member,
            joined_at: now,
        };
        self.env.store.insert_membership(&membership).await?;
        self.env
            .store
            .set_invitation_status(trip_id, user_id, InvitationStatus::Accepted)
            .await?;

        notify_quietly(
            &self.env.notifications,
            Notification::for_trip(
                invitation.invited_by,
                NotificationKind::InviteAccepted,
                "Invitation accepted",
                "Your invitation was accepted",
                trip_id,
            ),
        )
        .await;

        Ok(InvitationDecision::Accepted { membership })
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
