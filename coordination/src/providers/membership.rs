//! Membership directory trait.

use crate::error::Result;
use crate::state::{Membership, Role, TripId, UserId};

/// Read-only view of trip memberships.
///
/// Membership counts are the quorum denominator for surveys and votes, and
/// roles are the authorization predicate for organizer operations. Writes
/// happen through invitation acceptance on the
/// [`CoordinationStore`](super::CoordinationStore), not through this trait.
pub trait MembershipDirectory: Send + Sync {
    /// Number of members of a trip.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying query fails.
    async fn count_members(&self, trip_id: TripId) -> Result<u32>;

    /// Role of a user within a trip, or `None` if not a member.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying query fails.
    async fn role_of(&self, trip_id: TripId, user_id: UserId) -> Result<Option<Role>>;

    /// All memberships of a trip, used to fan out notifications.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying query fails.
    async fn members_of(&self, trip_id: TripId) -> Result<Vec<Membership>>;
}
