//! Integration tests for the voting engine.

#![allow(clippy::unwrap_used, clippy::panic)]

use caravan_coordination::engines::VotingEngine;
use caravan_coordination::environment::CoordinationEnvironment;
use caravan_coordination::error::CoordinationError;
use caravan_coordination::mocks::{
    FixedClock, InMemoryStore, MockAccountDirectory, MockEnvironment, MockMailer,
    MockNotificationSink, MockThrottle,
};
use caravan_coordination::providers::{CoordinationStore, NotificationKind};
use caravan_coordination::reports::StatusChange;
use caravan_coordination::state::{
    Membership, Role, SessionKind, SessionStatus, Trip, TripId, TripStatus, UserId, VoteOption,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

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

fn seed_trip_with_members(env: &MockEnvironment, extra: usize) -> (TripId, Vec<UserId>) {
    let trip_id = TripId::new();
    let owner = UserId::new();
    env.store
        .seed_trip(Trip {
            id: trip_id,
            title: "Winter escape".to_string(),
            owner,
            status: TripStatus::Surveying,
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

fn option(id: &str, title: &str) -> VoteOption {
    VoteOption {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
    }
}

#[tokio::test]
async fn create_moves_trip_to_voting_and_notifies_members() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 2);
    let engine = VotingEngine::new(env.clone());

    let created = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Destination,
            "Where to?",
            vec![option("cancun", "Cancun"), option("miami", "Miami")],
            Duration::days(3),
        )
        .await
        .unwrap();

    assert_eq!(created.session.status, SessionStatus::Active);
    assert_eq!(
        created.lifecycle,
        StatusChange::Applied {
            from: TripStatus::Surveying,
            to: TripStatus::Voting,
        }
    );
    for member in &members[1..] {
        assert_eq!(
            env.notifications
                .delivered_to(*member, NotificationKind::VotingOpened)
                .unwrap(),
            1
        );
    }
}

#[tokio::test]
async fn create_validates_options_and_authorization() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = VotingEngine::new(env.clone());

    let result = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Custom,
            "Broken",
            vec![option("a", "A"), option("a", "A again")],
            Duration::days(3),
        )
        .await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::DuplicateOption {
            option: "a".to_string(),
        }
    );

    let result = engine
        .create(trip_id, members[0], SessionKind::Custom, "Empty", vec![], Duration::days(3))
        .await;
    assert_eq!(result.unwrap_err(), CoordinationError::NoOptions);

    let result = engine
        .create(
            trip_id,
            members[1],
            SessionKind::Custom,
            "Not allowed",
            vec![option("a", "A")],
            Duration::days(3),
        )
        .await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::Unauthorized {
            required: Role::Admin,
        }
    );
}

#[tokio::test]
async fn recasting_the_same_option_updates_rank_without_a_new_row() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 2);
    let engine = VotingEngine::new(env.clone());
    let session = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Date,
            "Which week?",
            vec![option("w1", "Week 1"), option("w2", "Week 2")],
            Duration::days(3),
        )
        .await
        .unwrap()
        .session;

    engine.cast_vote(session.id, members[0], "w1", Some(1)).await.unwrap();
    let recast = engine.cast_vote(session.id, members[0], "w1", Some(2)).await.unwrap();

    assert_eq!(recast.voters, 1);
    assert_eq!(env.store.vote_row_count(session.id).unwrap(), 1);
    let votes = env.store.votes_for_session(session.id).await.unwrap();
    assert_eq!(votes[0].rank, Some(2));

    // A second option from the same voter adds a row but not a voter.
    let multi = engine.cast_vote(session.id, members[0], "w2", Some(1)).await.unwrap();
    assert_eq!(multi.voters, 1);
    assert_eq!(env.store.vote_row_count(session.id).unwrap(), 2);
    assert!(!multi.closed);
}

#[tokio::test]
async fn session_closes_when_every_member_has_voted() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 2);
    let engine = VotingEngine::new(env.clone());
    let session = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Destination,
            "Where to?",
            vec![option("cancun", "Cancun"), option("miami", "Miami")],
            Duration::days(3),
        )
        .await
        .unwrap()
        .session;

    let first = engine.cast_vote(session.id, members[0], "cancun", None).await.unwrap();
    assert!(!first.closed);
    let second = engine.cast_vote(session.id, members[1], "cancun", None).await.unwrap();
    assert!(!second.closed);

    // Third of three distinct voters closes the session.
    let third = engine.cast_vote(session.id, members[2], "miami", None).await.unwrap();
    assert!(third.closed);
    assert_eq!(third.voters, 3);

    let tally = engine.tally(session.id).await.unwrap();
    assert_eq!(tally.status, SessionStatus::Closed);
    assert_eq!(tally.total_votes, 3);
    assert_eq!(tally.entries[0].option.id, "cancun");
    assert_eq!(tally.entries[0].votes, 2);
    assert_eq!(tally.entries[0].percent, 67);
    assert_eq!(tally.entries[1].option.id, "miami");
    assert_eq!(tally.entries[1].votes, 1);
    assert_eq!(tally.entries[1].percent, 33);

    let result = engine.cast_vote(session.id, members[0], "miami", None).await;
    assert_eq!(result.unwrap_err(), CoordinationError::SessionNotActive);
}

#[tokio::test]
async fn expired_session_rejects_the_cast_and_self_closes() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = VotingEngine::new(env.clone());
    let session = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Activity,
            "What to do?",
            vec![option("ski", "Skiing"), option("spa", "Spa day")],
            Duration::days(2),
        )
        .await
        .unwrap()
        .session;

    env.clock.advance(Duration::days(3));

    // Even with zero prior votes, the next cast discovers the expiry.
    let result = engine.cast_vote(session.id, members[1], "ski", None).await;
    assert_eq!(result.unwrap_err(), CoordinationError::SessionExpired);
    assert_eq!(
        env.store.voting_session(session.id).await.unwrap().unwrap().status,
        SessionStatus::Closed
    );
}

#[tokio::test]
async fn tallying_an_overdue_session_closes_it_too() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = VotingEngine::new(env.clone());
    let session = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Accommodation,
            "Where to stay?",
            vec![option("hotel", "Hotel"), option("cabin", "Cabin")],
            Duration::days(2),
        )
        .await
        .unwrap()
        .session;

    env.clock.advance(Duration::days(3));

    let tally = engine.tally(session.id).await.unwrap();
    assert_eq!(tally.status, SessionStatus::Closed);
    assert_eq!(tally.total_votes, 0);
    assert!(tally.entries.iter().all(|e| e.percent == 0));
    assert_eq!(
        env.store.voting_session(session.id).await.unwrap().unwrap().status,
        SessionStatus::Closed
    );
}

#[tokio::test]
async fn tally_orders_by_votes_with_declared_order_breaking_ties() {
    let env = create_test_env();
    // Eight members so seven voters never reach quorum.
    let (trip_id, members) = seed_trip_with_members(&env, 7);
    let engine = VotingEngine::new(env.clone());
    let session = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Custom,
            "Pick one",
            vec![option("a", "A"), option("b", "B"), option("c", "C")],
            Duration::days(3),
        )
        .await
        .unwrap()
        .session;

    for member in &members[0..3] {
        engine.cast_vote(session.id, *member, "a", None).await.unwrap();
    }
    for member in &members[3..6] {
        engine.cast_vote(session.id, *member, "b", None).await.unwrap();
    }
    engine.cast_vote(session.id, members[6], "c", None).await.unwrap();

    let tally = engine.tally(session.id).await.unwrap();
    assert_eq!(tally.status, SessionStatus::Active);
    assert_eq!(tally.total_votes, 7);
    assert_eq!(tally.voters, 7);

    // A and B tie at 3 votes and keep their declared order; C trails.
    let ids: Vec<&str> = tally.entries.iter().map(|e| e.option.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(tally.entries[0].percent, 43);
    assert_eq!(tally.entries[1].percent, 43);
    assert_eq!(tally.entries[2].percent, 14);
}

#[tokio::test]
async fn casting_into_missing_closed_or_unknown_targets_fails_cleanly() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 0);
    let engine = VotingEngine::new(env.clone());

    let result = engine
        .cast_vote(
            caravan_coordination::state::SessionId::new(),
            members[0],
            "x",
            None,
        )
        .await;
    assert_eq!(result.unwrap_err(), CoordinationError::SessionNotFound);

    let session = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Custom,
            "Solo vote",
            vec![option("a", "A")],
            Duration::days(3),
        )
        .await
        .unwrap()
        .session;

    let result = engine.cast_vote(session.id, members[0], "nope", None).await;
    assert_eq!(
        result.unwrap_err(),
        CoordinationError::UnknownOption {
            option: "nope".to_string(),
        }
    );

    // The single member's vote closes the one-member session...
    let outcome = engine.cast_vote(session.id, members[0], "a", None).await.unwrap();
    assert!(outcome.closed);

    // ...after which casting reports the closed state, not expiry.
    let result = engine.cast_vote(session.id, members[0], "a", None).await;
    assert_eq!(result.unwrap_err(), CoordinationError::SessionNotActive);
}

#[tokio::test]
async fn a_trip_can_run_several_sessions_and_revote() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 1);
    let engine = VotingEngine::new(env.clone());

    let first = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Destination,
            "Round one",
            vec![option("a", "A"), option("b", "B")],
            Duration::days(3),
        )
        .await
        .unwrap();
    let second = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Date,
            "Round two",
            vec![option("w1", "Week 1"), option("w2", "Week 2")],
            Duration::days(3),
        )
        .await
        .unwrap();

    assert_ne!(first.session.id, second.session.id);
    // The second create finds the trip already in Voting.
    assert_eq!(
        second.lifecycle,
        StatusChange::Skipped {
            current: Some(TripStatus::Voting),
        }
    );

    // Both sessions accept votes independently.
    engine.cast_vote(first.session.id, members[1], "a", None).await.unwrap();
    engine.cast_vote(second.session.id, members[1], "w2", None).await.unwrap();
}

#[tokio::test]
async fn terminal_trips_never_change_status() {
    let env = create_test_env();
    let (trip_id, members) = seed_trip_with_members(&env, 0);
    // Simulate an external cancellation.
    let trip = env.store.trip(trip_id).await.unwrap().unwrap();
    env.store
        .seed_trip(Trip {
            status: TripStatus::Cancelled,
            ..trip
        })
        .unwrap();

    let engine = VotingEngine::new(env.clone());
    let created = engine
        .create(
            trip_id,
            members[0],
            SessionKind::Custom,
            "Too late",
            vec![option("a", "A")],
            Duration::days(3),
        )
        .await
        .unwrap();

    // The session itself is created; only the advisory transition skips.
    assert_eq!(
        created.lifecycle,
        StatusChange::Skipped {
            current: Some(TripStatus::Cancelled),
        }
    );
    assert_eq!(
        env.store.trip(trip_id).await.unwrap().unwrap().status,
        TripStatus::Cancelled
    );
}
