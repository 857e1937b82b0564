//! Mock providers for testing.
//!
//! In-memory implementations of every provider trait, so the full
//! coordination core can be exercised deterministically without a
//! database, SMTP relay, or wall clock.

mod accounts;
mod clock;
mod mailer;
mod notifications;
mod store;
mod throttle;

pub use accounts::MockAccountDirectory;
pub use clock::FixedClock;
pub use mailer::{MailerMode, MockMailer};
pub use notifications::MockNotificationSink;
pub use store::InMemoryStore;
pub use throttle::MockThrottle;

use crate::environment::CoordinationEnvironment;

/// Fully mocked coordination environment.
///
/// The [`InMemoryStore`] doubles as the membership directory so that
/// invitation acceptance is immediately visible to quorum counts.
pub type MockEnvironment = CoordinationEnvironment<
    InMemoryStore,
    InMemoryStore,
    MockAccountDirectory,
    MockMailer,
    MockNotificationSink,
    MockThrottle,
    FixedClock,
>;
