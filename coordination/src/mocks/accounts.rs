//! Mock account directory for testing.

use crate::error::{CoordinationError, Result};
use crate::providers::{Account, AccountDirectory};
use crate::state::UserId;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Mock account directory backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MockAccountDirectory {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
    broken: Arc<Mutex<HashSet<String>>>,
}

impl MockAccountDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make lookups for one email fail, to exercise per-item failure
    /// isolation in batch operations.
    pub fn break_lookups_for(&self, email: &str) {
        if let Ok(mut guard) = self.broken.lock() {
            guard.insert(email.to_lowercase());
        }
    }

    /// Register an account and return its id.
    ///
    /// # Errors
    ///
    /// Returns error if the directory mutex is poisoned.
    pub fn register(&self, email: &str, display_name: Option<&str>) -> Result<UserId> {
        let user_id = UserId::new();
        self.accounts
            .lock()
            .map_err(|_| CoordinationError::Internal)?
            .insert(
                email.to_lowercase(),
                Account {
                    user_id,
                    email: email.to_lowercase(),
                    display_name: display_name.map(ToString::to_string),
                },
            );
        Ok(user_id)
    }
}

impl AccountDirectory for MockAccountDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>> {
        if self
            .broken
            .lock()
            .map_err(|_| CoordinationError::Internal)?
            .contains(&email.to_lowercase())
        {
            return Err(CoordinationError::Storage(
                "mock account lookup failure".to_string(),
            ));
        }
        Ok(self
            .accounts
            .lock()
            .map_err(|_| CoordinationError::Internal)?
            .get(&email.to_lowercase())
            .cloned())
    }

    async fn account(&self, user_id: UserId) -> Result<Option<Account>> {
        Ok(self
            .accounts
            .lock()
            .map_err(|_| CoordinationError::Internal)?
            .values()
            .find(|account| account.user_id == user_id)
            .cloned())
    }
}
