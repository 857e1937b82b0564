//! PostgreSQL coordination store.
//!
//! Durable storage for trips, memberships, invitations, surveys, and
//! voting sessions. The atomic submit-recount-close operations take a
//! row-level lock (`SELECT … FOR UPDATE`) on the survey/session row, so
//! concurrent submissions serialize per aggregate and the close transition
//! fires exactly once, when the distinct participant count first reaches
//! quorum.
//!
//! Uniqueness is enforced by the schema (see `migrations/`): invitations
//! on `(trip_id, user_id)`, pending invitations on `(email, trip_id)`,
//! responses on `(survey_id, user_id)`, votes on
//! `(session_id, voter_id, option_id)`. All writes are `INSERT … ON
//! CONFLICT` upserts under those keys.
//!
//! # Example
//!
//! ```no_run
//! use caravan_coordination::stores::PostgresCoordinationStore;
//! use sqlx::PgPool;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = PgPool::connect("postgresql://localhost/caravan").await?;
//! let store = PostgresCoordinationStore::new(pool);
//! store.migrate().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{CoordinationError, Result};
use crate::providers::{
    CoordinationStore, InvitationWrite, MembershipDirectory, PendingWrite, SubmissionOutcome,
    TripStatusUpdate,
};
use crate::state::{
    Invitation, InvitationStatus, Membership, PendingInvitation, Role, SessionId, SessionKind,
    SessionStatus, Survey, SurveyId, SurveyResponse, SurveyStatus, Trip, TripId, TripStatus,
    UserId, Vote, VotingSession,
};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

/// PostgreSQL-backed coordination store.
#[derive(Clone)]
pub struct PostgresCoordinationStore {
    /// PostgreSQL connection pool.
    pool: PgPool,
}

impl PostgresCoordinationStore {
    /// Create a store over an existing connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns error if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CoordinationError::Storage(format!("migration failed: {e}")))?;
        Ok(())
    }
}

fn db_error(context: &str, error: sqlx::Error) -> CoordinationError {
    CoordinationError::Storage(format!("{context}: {error}"))
}

// ═══════════════════════════════════════════════════════════════════════
// Enum <-> TEXT mapping
// ═══════════════════════════════════════════════════════════════════════

fn trip_status_str(status: TripStatus) -> &'static str {
    match status {
        TripStatus::Planning => "PLANNING",
        TripStatus::Inviting => "INVITING",
        TripStatus::Surveying => "SURVEYING",
        TripStatus::Voting => "VOTING",
        TripStatus::Booked => "BOOKED",
        TripStatus::InProgress => "IN_PROGRESS",
        TripStatus::Completed => "COMPLETED",
        TripStatus::Cancelled => "CANCELLED",
    }
}

fn trip_status_from(s: &str) -> Result<TripStatus> {
    match s {
        "PLANNING" => Ok(TripStatus::Planning),
        "INVITING" => Ok(TripStatus::Inviting),
        "SURVEYING" => Ok(TripStatus::Surveying),
        "VOTING" => Ok(TripStatus::Voting),
        "BOOKED" => Ok(TripStatus::Booked),
        "IN_PROGRESS" => Ok(TripStatus::InProgress),
        "COMPLETED" => Ok(TripStatus::Completed),
        "CANCELLED" => Ok(TripStatus::Cancelled),
        other => Err(CoordinationError::Storage(format!(
            "unexpected trip status {other:?}"
        ))),
    }
}

fn invitation_status_str(status: InvitationStatus) -> &'static str {
    match status {
        InvitationStatus::Pending => "PENDING",
        InvitationStatus::Accepted => "ACCEPTED",
        InvitationStatus::Declined => "DECLINED",
        InvitationStatus::Expired => "EXPIRED",
    }
}

fn invitation_status_from(s: &str) -> Result<InvitationStatus> {
    match s {
        "PENDING" => Ok(InvitationStatus::Pending),
        "ACCEPTED" => Ok(InvitationStatus::Accepted),
        "DECLINED" => Ok(InvitationStatus::Declined),
        "EXPIRED" => Ok(InvitationStatus::Expired),
        other => Err(CoordinationError::Storage(format!(
            "unexpected invitation status {other:?}"
        ))),
    }
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::Member => "MEMBER",
        Role::Admin => "ADMIN",
        Role::Owner => "OWNER",
    }
}

fn role_from(s: &str) -> Result<Role> {
    match s {
        "MEMBER" => Ok(Role::Member),
        "ADMIN" => Ok(Role::Admin),
        "OWNER" => Ok(Role::Owner),
        other => Err(CoordinationError::Storage(format!(
            "unexpected role {other:?}"
        ))),
    }
}

fn session_kind_str(kind: SessionKind) -> &'static str {
    match kind {
        SessionKind::Destination => "DESTINATION",
        SessionKind::Activity => "ACTIVITY",
        SessionKind::Date => "DATE",
        SessionKind::Accommodation => "ACCOMMODATION",
        SessionKind::Custom => "CUSTOM",
    }
}

fn session_kind_from(s: &str) -> Result<SessionKind> {
    match s {
        "DESTINATION" => Ok(SessionKind::Destination),
        "ACTIVITY" => Ok(SessionKind::Activity),
        "DATE" => Ok(SessionKind::Date),
        "ACCOMMODATION" => Ok(SessionKind::Accommodation),
        "CUSTOM" => Ok(SessionKind::Custom),
        other => Err(CoordinationError::Storage(format!(
            "unexpected session kind {other:?}"
        ))),
    }
}

const ACTIVE: &str = "ACTIVE";
const CLOSED: &str = "CLOSED";

// ═══════════════════════════════════════════════════════════════════════
// Row decoding
// ═══════════════════════════════════════════════════════════════════════

fn decode_trip(row: &PgRow) -> Result<Trip> {
    let status: String = row
        .try_get("status")
        .map_err(|e| db_error("decoding trip", e))?;
    Ok(Trip {
        id: TripId(row.try_get("id").map_err(|e| db_error("decoding trip", e))?),
        title: row
            .try_get("title")
            .map_err(|e| db_error("decoding trip", e))?,
        owner: UserId(
            row.try_get("owner_id")
                .map_err(|e| db_error("decoding trip", e))?,
        ),
        status: trip_status_from(&status)?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| db_error("decoding trip", e))?,
    })
}

fn decode_invitation(row: &PgRow) -> Result<Invitation> {
    let status: String = row
        .try_get("status")
        .map_err(|e| db_error("decoding invitation", e))?;
    Ok(Invitation {
        trip_id: TripId(
            row.try_get("trip_id")
                .map_err(|e| db_error("decoding invitation", e))?,
        ),
        user_id: UserId(
            row.try_get("user_id")
                .map_err(|e| db_error("decoding invitation", e))?,
        ),
        invited_by: UserId(
            row.try_get("invited_by")
                .map_err(|e| db_error("decoding invitation", e))?,
        ),
        status: invitation_status_from(&status)?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| db_error("decoding invitation", e))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| db_error("decoding invitation", e))?,
    })
}

fn decode_pending(row: &PgRow) -> Result<PendingInvitation> {
    Ok(PendingInvitation {
        email: row
            .try_get("email")
            .map_err(|e| db_error("decoding pending invitation", e))?,
        trip_id: TripId(
            row.try_get("trip_id")
                .map_err(|e| db_error("decoding pending invitation", e))?,
        ),
        invited_by: UserId(
            row.try_get("invited_by")
                .map_err(|e| db_error("decoding pending invitation", e))?,
        ),
        created_at: row
            .try_get("created_at")
            .map_err(|e| db_error("decoding pending invitation", e))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| db_error("decoding pending invitation", e))?,
    })
}

fn decode_survey(row: &PgRow) -> Result<Survey> {
    let status: String = row
        .try_get("status")
        .map_err(|e| db_error("decoding survey", e))?;
    let questions: serde_json::Value = row
        .try_get("questions")
        .map_err(|e| db_error("decoding survey", e))?;
    Ok(Survey {
        id: SurveyId(
            row.try_get("id")
                .map_err(|e| db_error("decoding survey", e))?,
        ),
        trip_id: TripId(
            row.try_get("trip_id")
                .map_err(|e| db_error("decoding survey", e))?,
        ),
        title: row
            .try_get("title")
            .map_err(|e| db_error("decoding survey", e))?,
        status: if status == ACTIVE {
            SurveyStatus::Active
        } else {
            SurveyStatus::Closed
        },
        questions: serde_json::from_value(questions)
            .map_err(|e| CoordinationError::Storage(format!("decoding survey questions: {e}")))?,
        created_by: UserId(
            row.try_get("created_by")
                .map_err(|e| db_error("decoding survey", e))?,
        ),
        created_at: row
            .try_get("created_at")
            .map_err(|e| db_error("decoding survey", e))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| db_error("decoding survey", e))?,
    })
}

fn decode_session(row: &PgRow) -> Result<VotingSession> {
    let status: String = row
        .try_get("status")
        .map_err(|e| db_error("decoding voting session", e))?;
    let kind: String = row
        .try_get("kind")
        .map_err(|e| db_error("decoding voting session", e))?;
    let options: serde_json::Value = row
        .try_get("options")
        .map_err(|e| db_error("decoding voting session", e))?;
    Ok(VotingSession {
        id: SessionId(
            row.try_get("id")
                .map_err(|e| db_error("decoding voting session", e))?,
        ),
        trip_id: TripId(
            row.try_get("trip_id")
                .map_err(|e| db_error("decoding voting session", e))?,
        ),
        kind: session_kind_from(&kind)?,
        title: row
            .try_get("title")
            .map_err(|e| db_error("decoding voting session", e))?,
        status: if status == ACTIVE {
            SessionStatus::Active
        } else {
            SessionStatus::Closed
        },
        options: serde_json::from_value(options)
            .map_err(|e| CoordinationError::Storage(format!("decoding session options: {e}")))?,
        created_by: UserId(
            row.try_get("created_by")
                .map_err(|e| db_error("decoding voting session", e))?,
        ),
        created_at: row
            .try_get("created_at")
            .map_err(|e| db_error("decoding voting session", e))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|e| db_error("decoding voting session", e))?,
    })
}

fn decode_vote(row: &PgRow) -> Result<Vote> {
    let rank: Option<i32> = row
        .try_get("rank")
        .map_err(|e| db_error("decoding vote", e))?;
    #[allow(clippy::cast_sign_loss)]
    let rank = rank.map(|r| r as u32);
    Ok(Vote {
        session_id: SessionId(
            row.try_get("session_id")
                .map_err(|e| db_error("decoding vote", e))?,
        ),
        voter_id: UserId(
            row.try_get("voter_id")
                .map_err(|e| db_error("decoding vote", e))?,
        ),
        option_id: row
            .try_get("option_id")
            .map_err(|e| db_error("decoding vote", e))?,
        rank,
        cast_at: row
            .try_get("cast_at")
            .map_err(|e| db_error("decoding vote", e))?,
    })
}

impl CoordinationStore for PostgresCoordinationStore {
    async fn trip(&self, trip_id: TripId) -> Result<Option<Trip>> {
        let row = sqlx::query(
            "SELECT id, title, owner_id, status, created_at FROM trips WHERE id = $1",
        )
        .bind(trip_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("loading trip", e))?;
        row.as_ref().map(decode_trip).transpose()
    }

    async fn update_trip_status(
        &self,
        trip_id: TripId,
        expected: TripStatus,
        to: TripStatus,
    ) -> Result<TripStatusUpdate> {
        let result = sqlx::query("UPDATE trips SET status = $3 WHERE id = $1 AND status = $2")
            .bind(trip_id.0)
            .bind(trip_status_str(expected))
            .bind(trip_status_str(to))
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("updating trip status", e))?;

        if result.rows_affected() > 0 {
            return Ok(TripStatusUpdate::Applied { from: expected });
        }

        let current = sqlx::query("SELECT status FROM trips WHERE id = $1")
            .bind(trip_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("reading trip status", e))?;
        let current = match current {
            None => None,
            Some(row) => {
                let status: String = row
                    .try_get("status")
                    .map_err(|e| db_error("reading trip status", e))?;
                Some(trip_status_from(&status)?)
            }
        };
        Ok(TripStatusUpdate::Skipped { current })
    }

    async fn insert_membership(&self, membership: &Membership) -> Result<()> {
        sqlx::query(
            "INSERT INTO memberships (trip_id, user_id, role, joined_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (trip_id, user_id) DO NOTHING",
        )
        .bind(membership.trip_id.0)
        .bind(membership.user_id.0)
        .bind(role_str(membership.role))
        .bind(membership.joined_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("inserting membership", e))?;
        Ok(())
    }

    async fn invitation(&self, trip_id: TripId, user_id: UserId) -> Result<Option<Invitation>> {
        let row = sqlx::query(
            "SELECT trip_id, user_id, invited_by, status, created_at, expires_at
             FROM invitations WHERE trip_id = $1 AND user_id = $2",
        )
        .bind(trip_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("loading invitation", e))?;
        row.as_ref().map(decode_invitation).transpose()
    }

    async fn upsert_invitation(&self, candidate: &Invitation) -> Result<InvitationWrite> {
        // Single-statement upsert so the refresh-or-create decision happens
        // inside the same atomic unit as the write. `xmax = 0` is true only
        // for freshly inserted rows.
        let row = sqlx::query(
            "INSERT INTO invitations (trip_id, user_id, invited_by, status, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (trip_id, user_id) DO UPDATE SET
                 invited_by = CASE WHEN invitations.status <> 'ACCEPTED'
                     THEN EXCLUDED.invited_by ELSE invitations.invited_by END,
                 created_at = CASE WHEN invitations.status IN ('DECLINED', 'EXPIRED')
                     THEN EXCLUDED.created_at ELSE invitations.created_at END,
                 expires_at = CASE
                     WHEN invitations.status = 'PENDING'
                         THEN GREATEST(invitations.expires_at, EXCLUDED.expires_at)
                     WHEN invitations.status IN ('DECLINED', 'EXPIRED')
                         THEN EXCLUDED.expires_at
                     ELSE invitations.expires_at END,
                 status = CASE WHEN invitations.status IN ('DECLINED', 'EXPIRED')
                     THEN 'PENDING' ELSE invitations.status END
             RETURNING trip_id, user_id, invited_by, status, created_at, expires_at,
                       (xmax = 0) AS created",
        )
        .bind(candidate.trip_id.0)
        .bind(candidate.user_id.0)
        .bind(candidate.invited_by.0)
        .bind(invitation_status_str(candidate.status))
        .bind(candidate.created_at)
        .bind(candidate.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("upserting invitation", e))?;

        Ok(InvitationWrite {
            invitation: decode_invitation(&row)?,
            created: row
                .try_get("created")
                .map_err(|e| db_error("upserting invitation", e))?,
        })
    }

    async fn set_invitation_status(
        &self,
        trip_id: TripId,
        user_id: UserId,
        status: InvitationStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE invitations SET status = $3 WHERE trip_id = $1 AND user_id = $2",
        )
        .bind(trip_id.0)
        .bind(user_id.0)
        .bind(invitation_status_str(status))
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("updating invitation status", e))?;
        if result.rows_affected() == 0 {
            return Err(CoordinationError::InvitationNotFound);
        }
        Ok(())
    }

    async fn upsert_pending_invitation(
        &self,
        candidate: &PendingInvitation,
    ) -> Result<PendingWrite> {
        let row = sqlx::query(
            "INSERT INTO pending_invitations (email, trip_id, invited_by, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (email, trip_id) DO UPDATE SET
                 invited_by = EXCLUDED.invited_by,
                 expires_at = GREATEST(pending_invitations.expires_at, EXCLUDED.expires_at)
             RETURNING email, trip_id, invited_by, created_at, expires_at,
                       (xmax = 0) AS created",
        )
        .bind(&candidate.email)
        .bind(candidate.trip_id.0)
        .bind(candidate.invited_by.0)
        .bind(candidate.created_at)
        .bind(candidate.expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| db_error("upserting pending invitation", e))?;

        Ok(PendingWrite {
            pending: decode_pending(&row)?,
            created: row
                .try_get("created")
                .map_err(|e| db_error("upserting pending invitation", e))?,
        })
    }

    async fn pending_invitations_for(&self, email: &str) -> Result<Vec<PendingInvitation>> {
        let rows = sqlx::query(
            "SELECT email, trip_id, invited_by, created_at, expires_at
             FROM pending_invitations WHERE email = $1",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing pending invitations", e))?;
        rows.iter().map(decode_pending).collect()
    }

    async fn delete_pending_invitation(&self, email: &str, trip_id: TripId) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM pending_invitations WHERE email = $1 AND trip_id = $2",
        )
        .bind(email)
        .bind(trip_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("deleting pending invitation", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_survey(&self, survey: &Survey) -> Result<()> {
        let questions = serde_json::to_value(&survey.questions)
            .map_err(|e| CoordinationError::Storage(format!("encoding questions: {e}")))?;
        sqlx::query(
            "INSERT INTO surveys (id, trip_id, title, status, questions, created_by, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(survey.id.0)
        .bind(survey.trip_id.0)
        .bind(&survey.title)
        .bind(if survey.status == SurveyStatus::Active { ACTIVE } else { CLOSED })
        .bind(questions)
        .bind(survey.created_by.0)
        .bind(survey.created_at)
        .bind(survey.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                // The unique index on trip_id enforces one survey per trip.
                if db.is_unique_violation() {
                    return CoordinationError::SurveyAlreadyExists;
                }
            }
            db_error("inserting survey", e)
        })?;
        Ok(())
    }

    async fn survey_for_trip(&self, trip_id: TripId) -> Result<Option<Survey>> {
        let row = sqlx::query(
            "SELECT id, trip_id, title, status, questions, created_by, created_at, expires_at
             FROM surveys WHERE trip_id = $1",
        )
        .bind(trip_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("loading survey", e))?;
        row.as_ref().map(decode_survey).transpose()
    }

    async fn close_survey(&self, survey_id: SurveyId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE surveys SET status = 'CLOSED' WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(survey_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("closing survey", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_response(
        &self,
        response: &SurveyResponse,
        quorum: u32,
    ) -> Result<SubmissionOutcome> {
        let answers = serde_json::to_value(&response.answers)
            .map_err(|e| CoordinationError::Storage(format!("encoding answers: {e}")))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("starting transaction", e))?;

        // Row-level lock on the survey: concurrent submissions serialize
        // here, which is what makes the recount-and-close exact.
        let survey = sqlx::query("SELECT status FROM surveys WHERE id = $1 FOR UPDATE")
            .bind(response.survey_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("locking survey", e))?
            .ok_or(CoordinationError::SurveyNotFound)?;
        let status: String = survey
            .try_get("status")
            .map_err(|e| db_error("locking survey", e))?;
        if status != ACTIVE {
            return Err(CoordinationError::SurveyNotActive);
        }

        sqlx::query(
            "INSERT INTO survey_responses (survey_id, user_id, answers, submitted_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (survey_id, user_id) DO UPDATE SET
                 answers = EXCLUDED.answers,
                 submitted_at = EXCLUDED.submitted_at",
        )
        .bind(response.survey_id.0)
        .bind(response.user_id.0)
        .bind(answers)
        .bind(response.submitted_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("upserting response", e))?;

        let count: i64 = sqlx::query(
            "SELECT COUNT(DISTINCT user_id) AS participants
             FROM survey_responses WHERE survey_id = $1",
        )
        .bind(response.survey_id.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("counting respondents", e))?
        .try_get("participants")
        .map_err(|e| db_error("counting respondents", e))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let participants = count.max(0) as u32;
        let closed = participants >= quorum;
        if closed {
            sqlx::query("UPDATE surveys SET status = 'CLOSED' WHERE id = $1")
                .bind(response.survey_id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("closing survey", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("committing response", e))?;

        Ok(SubmissionOutcome {
            participants,
            closed,
        })
    }

    async fn insert_voting_session(&self, session: &VotingSession) -> Result<()> {
        let options = serde_json::to_value(&session.options)
            .map_err(|e| CoordinationError::Storage(format!("encoding options: {e}")))?;
        sqlx::query(
            "INSERT INTO voting_sessions (id, trip_id, kind, title, status, options, created_by, created_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(session.id.0)
        .bind(session.trip_id.0)
        .bind(session_kind_str(session.kind))
        .bind(&session.title)
        .bind(if session.status == SessionStatus::Active { ACTIVE } else { CLOSED })
        .bind(options)
        .bind(session.created_by.0)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("inserting voting session", e))?;
        Ok(())
    }

    async fn voting_session(&self, session_id: SessionId) -> Result<Option<VotingSession>> {
        let row = sqlx::query(
            "SELECT id, trip_id, kind, title, status, options, created_by, created_at, expires_at
             FROM voting_sessions WHERE id = $1",
        )
        .bind(session_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("loading voting session", e))?;
        row.as_ref().map(decode_session).transpose()
    }

    async fn close_voting_session(&self, session_id: SessionId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE voting_sessions SET status = 'CLOSED' WHERE id = $1 AND status = 'ACTIVE'",
        )
        .bind(session_id.0)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("closing voting session", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_vote(&self, vote: &Vote, quorum: u32) -> Result<SubmissionOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("starting transaction", e))?;

        let session = sqlx::query("SELECT status FROM voting_sessions WHERE id = $1 FOR UPDATE")
            .bind(vote.session_id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| db_error("locking voting session", e))?
            .ok_or(CoordinationError::SessionNotFound)?;
        let status: String = session
            .try_get("status")
            .map_err(|e| db_error("locking voting session", e))?;
        if status != ACTIVE {
            return Err(CoordinationError::SessionNotActive);
        }

        #[allow(clippy::cast_possible_wrap)]
        let rank = vote.rank.map(|r| r as i32);
        sqlx::query(
            "INSERT INTO votes (session_id, voter_id, option_id, rank, cast_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (session_id, voter_id, option_id) DO UPDATE SET
                 rank = EXCLUDED.rank,
                 cast_at = EXCLUDED.cast_at",
        )
        .bind(vote.session_id.0)
        .bind(vote.voter_id.0)
        .bind(&vote.option_id)
        .bind(rank)
        .bind(vote.cast_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| db_error("upserting vote", e))?;

        let count: i64 = sqlx::query(
            "SELECT COUNT(DISTINCT voter_id) AS participants
             FROM votes WHERE session_id = $1",
        )
        .bind(vote.session_id.0)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| db_error("counting voters", e))?
        .try_get("participants")
        .map_err(|e| db_error("counting voters", e))?;

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let participants = count.max(0) as u32;
        let closed = participants >= quorum;
        if closed {
            sqlx::query("UPDATE voting_sessions SET status = 'CLOSED' WHERE id = $1")
                .bind(vote.session_id.0)
                .execute(&mut *tx)
                .await
                .map_err(|e| db_error("closing voting session", e))?;
        }

        tx.commit()
            .await
            .map_err(|e| db_error("committing vote", e))?;

        Ok(SubmissionOutcome {
            participants,
            closed,
        })
    }

    async fn votes_for_session(&self, session_id: SessionId) -> Result<Vec<Vote>> {
        let rows = sqlx::query(
            "SELECT session_id, voter_id, option_id, rank, cast_at
             FROM votes WHERE session_id = $1",
        )
        .bind(session_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing votes", e))?;
        rows.iter().map(decode_vote).collect()
    }
}

impl MembershipDirectory for PostgresCoordinationStore {
    async fn count_members(&self, trip_id: TripId) -> Result<u32> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS members FROM memberships WHERE trip_id = $1")
            .bind(trip_id.0)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("counting members", e))?
            .try_get("members")
            .map_err(|e| db_error("counting members", e))?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let members = count.max(0) as u32;
        Ok(members)
    }

    async fn role_of(&self, trip_id: TripId, user_id: UserId) -> Result<Option<Role>> {
        let row = sqlx::query(
            "SELECT role FROM memberships WHERE trip_id = $1 AND user_id = $2",
        )
        .bind(trip_id.0)
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("loading role", e))?;
        match row {
            None => Ok(None),
            Some(row) => {
                let role: String = row.try_get("role").map_err(|e| db_error("loading role", e))?;
                Ok(Some(role_from(&role)?))
            }
        }
    }

    async fn members_of(&self, trip_id: TripId) -> Result<Vec<Membership>> {
        let rows = sqlx::query(
            "SELECT trip_id, user_id, role, joined_at FROM memberships WHERE trip_id = $1",
        )
        .bind(trip_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("listing members", e))?;
        rows.iter()
            .map(|row| {
                let role: String = row.try_get("role").map_err(|e| db_error("listing members", e))?;
                Ok(Membership {
                    trip_id: TripId(
                        row.try_get("trip_id")
                            .map_err(|e| db_error("listing members", e))?,
                    ),
                    user_id: UserId(
                        row.try_get("user_id")
                            .map_err(|e| db_error("listing members", e))?,
                    ),
                    role: role_from(&role)?,
                    joined_at: row
                        .try_get("joined_at")
                        .map_err(|e| db_error("listing members", e))?,
                })
            })
            .collect()
    }
}
