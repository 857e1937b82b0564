//! Integration tests for the survey engine.

#![allow(clippy::unwrap_used, clippy::panic)]

use caravan_coordination::engines::SurveyEngine;
use caravan_coordination::environment::CoordinationEnvironment;
use caravan_coordination::error::CoordinationError;
use caravan_coordination::mocks::{
    FixedClock, InMemoryStore, MockAccountDirectory, MockEnvironment, MockMailer,
    MockNotificationSink, MockThrottle,
};
use caravan_coordination::providers::{CoordinationStore, NotificationKind};
use caravan_coordination::reports::StatusChange;
use caravan_coordination::state::{
    AnswerValue, Membership, Question, QuestionKind, Role, SurveyStatus, Trip, TripId, TripStatus,
    UserId,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::collections::BTreeMap;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).unwrap()
}

fn create_test_env() -> MockEnvironment {
    let store = InMemoryStore::new();
    CoordinationEnvironment::new(
        store.clone(),
        store,
        MockAccountDirectory::new(),
        MockMailer::new(),
        MockNotificationSink::new(),
        MockThrottle::new(),
        FixedClock::new(base_time()),
    )
}

/// Seed a trip with an owner and `extra` plain members; returns the trip id
/// and all member ids (owner first).
fn seed_trip_with_members(env: &MockEnvironment, extra: usize) -> (TripId, Vec<UserId>) {
    let trip_id = TripId::new();
    let owner = UserId::new();
    env.store
        .seed_trip(Trip {
            id: trip_id,
            title: "Alps hike".to_string(),
            owner,
            status: TripStatus::Inviting,
            created_at: base_time(),
        })
        .unwrap();

    let mut members = vec![owner];
    env.store
        .seed_membership(Membership {
            trip_id,
            user_id: owner,
            role: Role::Owner,
            joined_at: base_time(),
        })
        .unwrap();
    for _ in 0..extra {
        let user_id = UserId::new();
        env.store
            .seed_membership(Membership {
                trip_id,
                user_id,
                role: Role::Member,
                joined_at: base_time(),
            })
            .unwrap();
        members.push(user_id);
    }
    (trip_id, members)
}

fn standard_questions() -> Vec<Question> {
    vec![
        Question {
            id: "vibe".to_string(),
            prompt: "What kind of trip?".to_string(),
            kind: QuestionKind::SingleChoice {
                choices: vec!["beach".to_string(), "mountains".to_string()],
            },
        },
        Question {
            id: "budget".to_string(),
            prompt: "Budget per person?".to_string(),
            kind: QuestionKind::Number,
        },
        Question {
            id: "dates".to_string(),
            prompt: "When works?".to_string(),
            kind: QuestionKind::DateRange,
        },
    ]
}

fn valid_answers() -> BTreeMap<String, AnswerValue> {
    let mut answers = BTreeMap::new();
    answers.insert("vibe".to_string(), AnswerValue::Text("mountains".to_string()));
    answers.insert("budget".to_string(), AnswerValue::Number(900.0));
    answers.insert(
        "dates".to_string(),
        AnswerValue::DateRange {
            start: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
        },
    );
    answers
}

#[tokio::test]
async fn create_moves_trip_to_surveying_and_notifies_members() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 2);
    let engine = SurveyEngine::new(env.clone());

    let created = engine
        .create(trip_id, members[0], "Preferences", standard_questions(), Duration::days(5))
        .await
        .unwrap();

    assert_eq!(created.survey.status, SurveyStatus::Active);
    assert_eq!(
        created.lifecycle,
        StatusChange::Applied {
            from: TripStatus::Inviting,
            to: TripStatus::Surveying,
        }
    );
    // Everyone but the creator hears about it.
    assert_eq!(
        env.notifications
            .delivered_to(members[0], NotificationKind::SurveyOpened)
            .unwrap(),
        0
    );
    for member in &members[1..] {
        assert_eq!(
            env.notifications
                .delivered_to(*member, NotificationKind::SurveyOpened)
                .unwrap(),
            1
        );
    }
}

#[tokio::test]
async fn a_trip_gets_at_most_one_survey_ever() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = SurveyEngine::new(env.clone());

    engine
        .create(trip_id, members[0], "First", standard_questions(), Duration::days(5))
        .await
        .unwrap();

    // A second survey is rejected while the first is active...
    let result = engine
        .create(trip_id, members[0], "Second", standard_questions(), Duration::days(5))
        .await;
    assert_eq!(result.unwrap_err(), CoordinationError::SurveyAlreadyExists);

    // ...and still rejected once it is closed.
    for member in &members {
        engine.submit_response(trip_id, *member, valid_answers()).await.unwrap();
    }
    let result = engine
        .create(trip_id, members[0], "Third", standard_questions(), Duration::days(5))
        .await;
    assert_eq!(result.unwrap_err(), CoordinationError::SurveyAlreadyExists);
}

#[tokio::test]
async fn create_requires_an_organizer_role() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = SurveyEngine::new(env.clone());

    let result = engine
        .create(trip_id, members[1], "Nope", standard_questions(), Duration::days(5))
        .await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::Unauthorized {
            required: Role::Admin,
        }
    );

    let result = engine
        .create(TripId::new(), members[0], "Nope", standard_questions(), Duration::days(5))
        .await;
    assert_eq!(result.unwrap_err(), CoordinationError::TripNotFound);
}

#[tokio::test]
async fn quorum_closes_exactly_at_the_member_count() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 2);
    let engine = SurveyEngine::new(env.clone());
    engine
        .create(trip_id, members[0], "Preferences", standard_questions(), Duration::days(5))
        .await
        .unwrap();

    // N-1 distinct respondents leave the survey active.
    let first = engine
        .submit_response(trip_id, members[0], valid_answers())
        .await
        .unwrap();
    assert!(!first.closed);
    assert_eq!(first.respondents, 1);

    let second = engine
        .submit_response(trip_id, members[1], valid_answers())
        .await
        .unwrap();
    assert!(!second.closed);
    assert_eq!(second.respondents, 2);

    // A resubmission is not a new respondent and never closes early.
    let resubmit = engine
        .submit_response(trip_id, members[1], valid_answers())
        .await
        .unwrap();
    assert!(!resubmit.closed);
    assert_eq!(resubmit.respondents, 2);

    // The Nth distinct member closes it.
    let last = engine
        .submit_response(trip_id, members[2], valid_answers())
        .await
        .unwrap();
    assert!(last.closed);
    assert_eq!(last.respondents, 3);
    assert_eq!(
        engine.survey(trip_id).await.unwrap().unwrap().status,
        SurveyStatus::Closed
    );

    // Closed means closed: no reopening, no further submissions.
    let result = engine.submit_response(trip_id, members[0], valid_answers()).await;
    assert_eq!(result.unwrap_err(), CoordinationError::SurveyNotActive);
}

#[tokio::test]
async fn submission_requires_membership_and_a_survey() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 0);
    let engine = SurveyEngine::new(env.clone());

    let result = engine.submit_response(trip_id, members[0], valid_answers()).await;
    assert_eq!(result.unwrap_err(), CoordinationError::SurveyNotFound);

    engine
        .create(trip_id, members[0], "Preferences", standard_questions(), Duration::days(5))
        .await
        .unwrap();
    let result = engine
        .submit_response(trip_id, UserId::new(), valid_answers())
        .await;
    assert_eq!(result.unwrap_err(), CoordinationError::NotAMember);
}

#[tokio::test]
async fn invalid_answers_are_rejected_without_partial_writes() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = SurveyEngine::new(env.clone());
    engine
        .create(trip_id, members[0], "Preferences", standard_questions(), Duration::days(5))
        .await
        .unwrap();

    // Unknown question id.
    let mut answers = valid_answers();
    answers.insert("color".to_string(), AnswerValue::Text("blue".to_string()));
    let result = engine.submit_response(trip_id, members[0], answers).await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::UnknownQuestion {
            question: "color".to_string(),
        }
    );

    // Type mismatch.
    let mut answers = valid_answers();
    answers.insert("budget".to_string(), AnswerValue::Text("lots".to_string()));
    let result = engine.submit_response(trip_id, members[0], answers).await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::AnswerTypeMismatch {
            question: "budget".to_string(),
            expected: "a number",
        }
    );

    // Choice outside the declared list.
    let mut answers = valid_answers();
    answers.insert("vibe".to_string(), AnswerValue::Text("desert".to_string()));
    let result = engine.submit_response(trip_id, members[0], answers).await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::UnknownChoice {
            question: "vibe".to_string(),
            choice: "desert".to_string(),
        }
    );

    // Backwards date range.
    let mut answers = valid_answers();
    answers.insert(
        "dates".to_string(),
        AnswerValue::DateRange {
            start: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
            end: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
        },
    );
    let result = engine.submit_response(trip_id, members[0], answers).await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::InvalidDateRange {
            question: "dates".to_string(),
        }
    );

    // None of the rejected submissions left a response behind.
    let ok = engine
        .submit_response(trip_id, members[0], valid_answers())
        .await
        .unwrap();
    assert_eq!(ok.respondents, 1);
}

#[tokio::test]
async fn duplicate_question_ids_are_rejected_at_creation() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 0);
    let engine = SurveyEngine::new(env.clone());

    let questions = vec![
        Question {
            id: "q".to_string(),
            prompt: "one".to_string(),
            kind: QuestionKind::FreeText,
        },
        Question {
            id: "q".to_string(),
            prompt: "two".to_string(),
            kind: QuestionKind::Number,
        },
    ];
    let result = engine
        .create(trip_id, members[0], "Broken", questions, Duration::days(5))
        .await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::DuplicateQuestion {
            question: "q".to_string(),
        }
    );
    // The rejected create left nothing behind.
    assert!(env.store.survey_for_trip(trip_id).await.unwrap().is_none());
}

#[tokio::test]
async fn reading_an_overdue_survey_closes_it() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = SurveyEngine::new(env.clone());
    engine
        .create(trip_id, members[0], "Preferences", standard_questions(), Duration::days(5))
        .await
        .unwrap();

    env.clock.advance(Duration::days(6));

    let survey = engine.survey(trip_id).await.unwrap().unwrap();
    assert_eq!(survey.status, SurveyStatus::Closed);
    // The close is persisted, so submissions are now rejected.
    let result = engine.submit_response(trip_id, members[1], valid_answers()).await;
    assert_eq!(result.unwrap_err(), CoordinationError::SurveyNotActive);
}

#[tokio::test]
async fn resubmission_overwrites_the_previous_answers() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = SurveyEngine::new(env.clone());
    engine
        .create(trip_id, members[0], "Preferences", standard_questions(), Duration::days(5))
        .await
        .unwrap();

    engine
        .submit_response(trip_id, members[0], valid_answers())
        .await
        .unwrap();

    let mut updated = valid_answers();
    updated.insert("budget".to_string(), AnswerValue::Number(1500.0));
    let outcome = engine
        .submit_response(trip_id, members[0], updated)
        .await
        .unwrap();

    // Still one respondent: the row was overwritten, not duplicated.
    assert_eq!(outcome.respondents, 1);
    assert!(!outcome.closed);
}
