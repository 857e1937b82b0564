//! Storage implementations for the coordination core.
//!
//! The [`CoordinationStore`](crate::providers::CoordinationStore) trait is
//! the seam; this module holds the concrete backends:
//!
//! - **PostgreSQL** (feature `postgres`): production storage with
//!   row-level locking for the atomic submit-recount-close operations
//! - The in-memory store for tests lives in [`crate::mocks`]

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PostgresCoordinationStore;
