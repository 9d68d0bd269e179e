//! Account management: login, admin user administration and self-service.

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use sample_depot_core::events::ServerEvent;
use sample_depot_core::{Role, UserId, UserSummary};

use super::error::{ServiceError, required};
use super::password::{hash_password, verify_password};
use crate::db::UserStore;
use crate::realtime::EventHub;

/// Reason sent to a user whose account is removed while connected.
pub const ACCOUNT_DELETED: &str = "Your account has been deleted";

/// User operations over any [`UserStore`].
pub struct UserService<'a, S> {
    store: &'a S,
    hub: &'a EventHub,
    default_password: &'a SecretString,
}

impl<'a, S: UserStore> UserService<'a, S> {
    /// Create a new user service. New and reset accounts get `default_password`.
    #[must_use]
    pub const fn new(store: &'a S, hub: &'a EventHub, default_password: &'a SecretString) -> Self {
        Self {
            store,
            hub,
            default_password,
        }
    }

    /// Check a name/password pair.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::InvalidCredentials` for an unknown name or a
    /// wrong password.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, name: &str, password: &str) -> Result<UserSummary, ServiceError> {
        let Some((user, hash)) = self.store.find_credentials(name.trim()).await? else {
            tracing::debug!("Login for unknown user");
            return Err(ServiceError::InvalidCredentials);
        };
        if !verify_password(password, &hash) {
            tracing::debug!(user_id = %user.id, "Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown id.
    pub async fn get_user(&self, id: UserId) -> Result<UserSummary, ServiceError> {
        self.store
            .get_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id}")))
    }

    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, ServiceError> {
        Ok(self.store.list_users().await?)
    }

    /// Create an account with the default password. The role defaults to `user`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an empty name or unknown role and
    /// `ServiceError::Conflict` if the name is taken.
    #[instrument(skip(self))]
    pub async fn create_user(
        &self,
        name: Option<&str>,
        role: Option<&str>,
    ) -> Result<UserSummary, ServiceError> {
        let name = required(name, "name")?;
        let role = match role.map(str::trim).filter(|r| !r.is_empty()) {
            Some(role) => parse_role(role)?,
            None => Role::default(),
        };
        let hash = hash_password(self.default_password.expose_secret())?;

        let user = self.store.insert_user(&name, &hash, role).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        self.hub.broadcast(ServerEvent::UserAdded(user.clone()));
        Ok(user)
    }

    /// Change a user's role. Everyone learns of it; the user is told directly.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an unknown role and
    /// `ServiceError::NotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn set_role(&self, id: UserId, role: Option<&str>) -> Result<UserSummary, ServiceError> {
        let role = parse_role(&required(role, "role")?)?;
        let user = self
            .store
            .set_role(id, role)
            .await
            .map_err(ServiceError::or_missing(format!("user {id}")))?;

        tracing::info!(user_id = %id, role = %role, "Role changed");
        self.hub.broadcast(ServerEvent::RoleUpdated { id, role });
        self.hub.send_to_user(id, ServerEvent::RoleChanged { role });
        Ok(user)
    }

    /// Put a user's password back to the default.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn reset_password(&self, id: UserId) -> Result<(), ServiceError> {
        let hash = hash_password(self.default_password.expose_secret())?;
        self.store
            .set_password(id, &hash)
            .await
            .map_err(ServiceError::or_missing(format!("user {id}")))?;
        tracing::info!(user_id = %id, "Password reset");
        Ok(())
    }

    /// Remove an account. A connected user is logged out first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Forbidden` when `actor` targets itself and
    /// `ServiceError::NotFound` for an unknown user.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, actor: UserId, id: UserId) -> Result<(), ServiceError> {
        if actor == id {
            return Err(ServiceError::Forbidden(
                "you cannot delete your own account".to_owned(),
            ));
        }
        self.store
            .delete_user(id)
            .await
            .map_err(ServiceError::or_missing(format!("user {id}")))?;

        tracing::info!(user_id = %id, deleted_by = %actor, "User deleted");
        self.hub.send_to_user(
            id,
            ServerEvent::ForceLogout {
                reason: ACCOUNT_DELETED.to_owned(),
            },
        );
        self.hub.broadcast(ServerEvent::UserDeleted { id });
        Ok(())
    }

    /// Self-service rename.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an empty name and
    /// `ServiceError::Conflict` if the name is taken.
    #[instrument(skip(self))]
    pub async fn rename(&self, id: UserId, name: Option<&str>) -> Result<UserSummary, ServiceError> {
        let name = required(name, "name")?;
        let user = self
            .store
            .rename_user(id, &name)
            .await
            .map_err(ServiceError::or_missing(format!("user {id}")))?;

        self.hub.broadcast(ServerEvent::UserRenamed {
            id,
            name: user.name.clone(),
        });
        Ok(user)
    }

    /// Self-service password change, checked against the current password.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for an empty new password and
    /// `ServiceError::Forbidden` if the current password does not match.
    #[instrument(skip(self, current, new))]
    pub async fn change_password(
        &self,
        id: UserId,
        current: Option<&str>,
        new: Option<&str>,
    ) -> Result<(), ServiceError> {
        let new = new
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ServiceError::Validation("new password is required".to_owned()))?;
        let hash = self
            .store
            .password_hash(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {id}")))?;

        if !verify_password(current.unwrap_or_default(), &hash) {
            return Err(ServiceError::Forbidden(
                "current password is incorrect".to_owned(),
            ));
        }

        let hash = hash_password(new)?;
        self.store.set_password(id, &hash).await?;
        tracing::info!(user_id = %id, "Password changed");
        Ok(())
    }
}

fn parse_role(role: &str) -> Result<Role, ServiceError> {
    role.parse()
        .map_err(|e: sample_depot_core::RoleParseError| ServiceError::Validation(e.to_string()))
}
