//! Account directory trait.

use super::Account;
use crate::error::Result;
use crate::state::UserId;

/// Read-only view of user accounts, supplied by the identity collaborator.
pub trait AccountDirectory: Send + Sync {
    /// Resolve an email address to an account, if one exists.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying query fails.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>>;

    /// Look up an account by id.
    ///
    /// # Errors
    ///
    /// Returns error if the underlying query fails.
    async fn account(&self, user_id: UserId) -> Result<Option<Account>>;
}
