//! User roles.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Permission level of a depot user.
///
/// `Super` is a legal stored value that the role validator accepts. It carries
/// no privileges beyond `User` and is never assigned by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can manage inventory and create shipments.
    #[default]
    User,
    /// Can additionally manage users.
    Admin,
    /// Reserved.
    Super,
}

impl Role {
    /// Whether this role may manage other users.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    /// The lowercase wire/database name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Super => "super",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "super" => Ok(Self::Super),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::User, Role::Admin, Role::Super] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert_eq!(
            "owner".parse::<Role>(),
            Err(RoleParseError("owner".to_owned()))
        );
    }

    #[test]
    fn test_only_admin_manages_users() {
        assert!(Role::Admin.is_admin());
        assert!(!Role::User.is_admin());
        assert!(!Role::Super.is_admin());
    }

    #[test]
    fn test_role_serde_is_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::Super).ok().as_deref(),
            Some("\"super\"")
        );
    }
}
