//! Coordination environment.
//!
//! This module defines the environment type for dependency injection into
//! the coordination engines.

use crate::providers::{
    AccountDirectory, Clock, CoordinationStore, InvitationMailer, MembershipDirectory,
    NotificationSink, ThrottleStore,
};

/// Coordination environment.
///
/// Bundles every external collaborator the engines need.
///
/// # Type Parameters
///
/// - `S`: Coordination store
/// - `M`: Membership directory
/// - `A`: Account directory
/// - `E`: Invitation mailer
/// - `N`: Notification sink
/// - `T`: Throttle store
/// - `C`: Clock
#[derive(Clone)]
pub struct CoordinationEnvironment<S, M, A, E, N, T, C>
where
    S: CoordinationStore + Clone,
    M: MembershipDirectory + Clone,
    A: AccountDirectory + Clone,
    E: InvitationMailer + Clone,
    N: NotificationSink + Clone,
    T: ThrottleStore + Clone,
    C: Clock + Clone,
{
    /// Persistent store for all coordination entities.
    pub store: S,

    /// Read-only membership directory.
    pub membership: M,

    /// Read-only account directory.
    pub accounts: A,

    /// Outbound invitation mailer (advisory).
    pub mailer: E,

    /// In-app notification sink (fire-and-forget).
    pub notifications: N,

    /// Shared throttle counters.
    pub throttle: T,

    /// Time source for deadlines and lazy expiry.
    pub clock: C,
}

impl<S, M, A, E, N, T, C> CoordinationEnvironment<S, M, A, E, N, T, C>
where
    S: CoordinationStore + Clone,
    M: MembershipDirectory + Clone,
    A: AccountDirectory + Clone,
    E: InvitationMailer + Clone,
    N: NotificationSink + Clone,
    T: ThrottleStore + Clone,
    C: Clock + Clone,
{
    /// Create a new coordination environment.
    #[must_use]
    pub const fn new(
        store: S,
        membership: M,
        accounts: A,
        mailer: E,
        notifications: N,
        throttle: T,
        clock: C,
    ) -> Self {
        Self {
            store,
            membership,
            accounts,
            mailer,
            notifications,
            throttle,
            clock,
        }
    }
}
