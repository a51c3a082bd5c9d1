//! Directory of user accounts the storefront currently recognises.
//!
//! Account management lives elsewhere; this is the slice the cart endpoints
//! need to tell a live session from a stale one. A session whose user is no
//! longer listed here is rejected with `stale_session`.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use grocer_core::UserId;

#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashSet<UserId>>,
}

impl UserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user as active. Returns `false` if already known.
    pub fn register(&self, user: UserId) -> bool {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user)
    }

    /// Forget a user (account deleted or data reset).
    pub fn remove(&self, user: UserId) -> bool {
        self.users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user)
    }

    #[must_use]
    pub fn contains(&self, user: UserId) -> bool {
        self.users
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&user)
    }
}
