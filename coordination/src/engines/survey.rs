//! Survey engine.
//!
//! Owns the single survey of a trip: `no survey → Active → Closed`, with no
//! path back to `Active`. Responses are per-member upserts, and the survey
//! closes automatically the moment every trip member has responded. The
//! upsert-recount-close sequence runs as one atomic store operation, so
//! concurrent submissions cannot miss or double-apply the close.

use crate::engines::lifecycle::{LifecycleEvent, advance_trip_status};
use crate::engines::notify_quietly;
use crate::environment::CoordinationEnvironment;
use crate::error::{CoordinationError, Result};
use crate::providers::{
    AccountDirectory, Clock, CoordinationStore, InvitationMailer, MembershipDirectory,
    Notification, NotificationKind, NotificationSink, ThrottleStore,
};
use crate::reports::{ResponseRecorded, SurveyCreated};
use crate::state::{
    AnswerValue, Question, QuestionKind, Role, Survey, SurveyId, SurveyResponse, SurveyStatus,
    TripId, UserId,
};
use chrono::Duration;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// Survey engine.
///
/// See the [module docs](self) for the state machine.
#[derive(Clone)]
pub struct SurveyEngine<S, M, A, E, N, T, C>
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

impl<S, M, A, E, N, T, C> SurveyEngine<S, M, A, E, N, T, C>
where
    S: CoordinationStore + Clone,
    M: MembershipDirectory + Clone,
    A: AccountDirectory + Clone,
    E: InvitationMailer + Clone,
    N: NotificationSink + Clone,
    T: ThrottleStore + Clone,
    C: Clock + Clone,
{
    /// Create a survey engine.
    #[must_use]
    pub const fn new(env: CoordinationEnvironment<S, M, A, E, N, T, C>) -> Self {
        Self { env }
    }

    /// Open the trip's survey.
    ///
    /// A trip gets at most one survey, ever: creation fails while any
    /// survey exists for the trip, regardless of its status. On success the
    /// trip status moves to `Surveying` (advisory) and every other member
    /// is notified.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The trip does not exist → `CoordinationError::TripNotFound`
    /// - The actor is not a member → `CoordinationError::NotAMember`
    /// - The actor is a plain member → `CoordinationError::Unauthorized`
    /// - Question ids collide → `CoordinationError::DuplicateQuestion`
    /// - A survey already exists → `CoordinationError::SurveyAlreadyExists`
    /// - A store write fails
    #[instrument(skip(self, title, questions))]
    pub async fn create(
        &self,
        trip_id: TripId,
        actor_id: UserId,
        title: impl Into<String>,
        questions: Vec<Question>,
        ttl: Duration,
    ) -> Result<SurveyCreated> {
        self.env
            .store
            .trip(trip_id)
            .await?
            .ok_or(CoordinationError::TripNotFound)?;
        self.require_organizer(trip_id, actor_id).await?;
        validate_questions(&questions)?;

        let now = self.env.clock.now();
        let survey = Survey {
            id: SurveyId::new(),
            trip_id,
            title: title.into(),
            status: SurveyStatus::Active,
            questions,
            created_by: actor_id,
            created_at: now,
            expires_at: now + ttl,
        };
        self.env.store.insert_survey(&survey).await?;

        let lifecycle =
            advance_trip_status(&self.env.store, trip_id, LifecycleEvent::SurveyOpened).await;
        self.notify_members(trip_id, actor_id, &survey.title).await;

        info!(?trip_id, survey_id = ?survey.id, "survey opened");
        Ok(SurveyCreated { survey, lifecycle })
    }

    /// Record one member's answers.
    ///
    /// Answers are validated against their questions' declared kinds before
    /// anything is written; a submission either fully applies or fully
    /// fails. Resubmission by the same member overwrites the previous
    /// answers. When the distinct-respondent count reaches the trip's
    /// member count, the same atomic operation closes the survey; a
    /// resubmission never closes it early and never reopens it.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The submitter is not a member → `CoordinationError::NotAMember`
    /// - The trip has no survey → `CoordinationError::SurveyNotFound`
    /// - The survey is closed → `CoordinationError::SurveyNotActive`
    /// - An answer fails validation → `CoordinationError::UnknownQuestion`,
    ///   `AnswerTypeMismatch`, `UnknownChoice`, or `InvalidDateRange`
    /// - A store write fails
    #[instrument(skip(self, answers))]
    pub async fn submit_response(
        &self,
        trip_id: TripId,
        user_id: UserId,
        answers: BTreeMap<String, AnswerValue>,
    ) -> Result<ResponseRecorded> {
        if self
            .env
            .membership
            .role_of(trip_id, user_id)
            .await?
            .is_none()
        {
            return Err(CoordinationError::NotAMember);
        }

        let survey = self
            .env
            .store
            .survey_for_trip(trip_id)
            .await?
            .ok_or(CoordinationError::SurveyNotFound)?;
        if survey.status != SurveyStatus::Active {
            return Err(CoordinationError::SurveyNotActive);
        }

        for (question_id, answer) in &answers {
            let question = survey
                .question(question_id)
                .ok_or_else(|| CoordinationError::UnknownQuestion {
                    question: question_id.clone(),
                })?;
            validate_answer(question, answer)?;
        }

        let member_count = self.env.membership.count_members(trip_id).await?;
        let response = SurveyResponse {
            survey_id: survey.id,
            user_id,
            answers,
            submitted_at: self.env.clock.now(),
        };
        let outcome = self.env.store.record_response(&response, member_count).await?;

        if outcome.closed {
            info!(survey_id = ?survey.id, respondents = outcome.participants, "survey closed at quorum");
        }

        Ok(ResponseRecorded {
            respondents: outcome.participants,
            member_count,
            closed: outcome.closed,
        })
    }

    /// Read the trip's survey, applying lazy deadline expiry: an `Active`
    /// survey past `expires_at` is closed by this read before being
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails.
    pub async fn survey(&self, trip_id: TripId) -> Result<Option<Survey>> {
        let Some(mut survey) = self.env.store.survey_for_trip(trip_id).await? else {
            return Ok(None);
        };
        if survey.status == SurveyStatus::Active && self.env.clock.now() > survey.expires_at {
            self.env.store.close_survey(survey.id).await?;
            survey.status = SurveyStatus::Closed;
        }
        Ok(Some(survey))
    }

    /// Notify every member except the actor that the survey opened.
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
                    NotificationKind::SurveyOpened,
                    "New survey",
                    format!("The survey \"{title}\" wants your preferences"),
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

/// Reject duplicate question ids within one survey.
fn validate_questions(questions: &[Question]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for question in questions {
        if !seen.insert(question.id.as_str()) {
            return Err(CoordinationError::DuplicateQuestion {
                question: question.id.clone(),
            });
        }
    }
    Ok(())
}

/// Validate one answer against its question's declared kind.
fn validate_answer(question: &Question, answer: &AnswerValue) -> Result<()> {
    let mismatch = |expected: &'static str| CoordinationError::AnswerTypeMismatch {
        question: question.id.clone(),
        expected,
    };

    match &question.kind {
        QuestionKind::FreeText => match answer {
            AnswerValue::Text(_) => Ok(()),
            _ => Err(mismatch("text")),
        },
        QuestionKind::Number => match answer {
            AnswerValue::Number(_) => Ok(()),
            _ => Err(mismatch("a number")),
        },
        QuestionKind::SingleChoice { choices } => match answer {
            AnswerValue::Text(choice) if choices.contains(choice) => Ok(()),
            AnswerValue::Text(choice) => Err(CoordinationError::UnknownChoice {
                question: question.id.clone(),
                choice: choice.clone(),
            }),
            _ => Err(mismatch("one of the listed choices")),
        },
        QuestionKind::MultiChoice { choices } => match answer {
            AnswerValue::TextList(selected) => {
                for choice in selected {
                    if !choices.contains(choice) {
                        return Err(CoordinationError::UnknownChoice {
                            question: question.id.clone(),
                            choice: choice.clone(),
                        });
                    }
                }
                Ok(())
            }
            _ => Err(mismatch("a list of the listed choices")),
        },
        QuestionKind::DateRange => match answer {
            AnswerValue::DateRange { start, end } if start <= end => Ok(()),
            AnswerValue::DateRange { .. } => Err(CoordinationError::InvalidDateRange {
                question: question.id.clone(),
            }),
            _ => Err(mismatch("a start/end date range")),
        },
    }
}
