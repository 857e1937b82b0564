//! # Caravan Coordination
//!
//! The group decision coordination core of the Caravan trip planner: the
//! logic that drives a trip through its planning lifecycle, reconciles
//! invitations for people who may or may not have accounts yet, collects
//! survey responses, and runs voting sessions with quorum-based closing.
//!
//! ## Components
//!
//! - **Invitation reconciler**: resolves invited email addresses to
//!   existing accounts (durable invitations) or to time-limited pending
//!   invitations, and promotes pending invitations once an account appears.
//! - **Survey engine**: one survey per trip; idempotent per-member answer
//!   upserts; auto-closes when every member has responded.
//! - **Voting engine**: per-trip voting sessions; per-option vote upserts
//!   with optional rank; lazy deadline expiry; deterministic tallies;
//!   auto-closes once every member has voted.
//! - **Trip lifecycle**: advisory trip-status advancement triggered as a
//!   side effect of the other three components.
//!
//! ## Architecture
//!
//! All external collaborators (storage, membership, accounts, email,
//! notifications, throttling, time) are trait providers injected through a
//! [`CoordinationEnvironment`]. The engines contain no I/O of their own, so
//! the whole coordination core runs at memory speed under test:
//!
//! ```text
//! caller → engine (validate) → store (atomic upsert + recount + close)
//!                 ↘ advisory side effects (lifecycle, notify, email)
//! ```
//!
//! ## Example: casting a vote
//!
//! ```rust,ignore
//! use caravan_coordination::engines::VotingEngine;
//!
//! let engine = VotingEngine::new(env);
//! let recorded = engine.cast_vote(session_id, voter, "cancun", Some(1)).await?;
//! if recorded.closed {
//!     let tally = engine.tally(session_id).await?;
//!     println!("winner: {}", tally.entries[0].option.title);
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

// Public modules
pub mod config;
pub mod engines;
pub mod environment;
pub mod error;
pub mod providers;
pub mod reports;
pub mod state;
pub mod stores;

#[cfg(feature = "test-utils")]
pub mod mocks;

// Re-export main types for convenience
pub use engines::{InvitationReconciler, SurveyEngine, VotingEngine};
pub use environment::CoordinationEnvironment;
pub use error::{CoordinationError, Result};
pub use state::{Role, SessionId, SurveyId, TripId, TripStatus, UserId};
