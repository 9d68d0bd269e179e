//! Session-related types.
//!
//! Types stored in the session for authentication state.

use serde::{Deserialize, Serialize};

use sample_depot_core::{Role, UserId, UserSummary};

/// Session-stored user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User's database ID.
    pub id: UserId,
    /// Display name at login (refreshed on each authenticated request).
    pub name: String,
    pub role: Role,
}

impl CurrentUser {
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

impl From<UserSummary> for CurrentUser {
    fn from(user: UserSummary) -> Self {
        Self {
            id: user.id,
            name: user.name,
            role: user.role,
        }
    }
}

impl From<CurrentUser> for UserSummary {
    fn from(user: CurrentUser) -> Self {
        Self {
            id: user.id,
            name: user.name,
            role: user.role,
        }
    }
}

/// Session keys for authentication data.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";
}
