//! Public view of a depot user.

use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::role::Role;

/// A user as exposed to clients (never carries the credential).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub name: String,
    pub role: Role,
}
