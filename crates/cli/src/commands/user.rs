//! User management commands.
//!
//! # Usage
//!
//! ```bash
//! depot-cli user create -n anna -r admin -p "first-password"
//! ```

use sample_depot_core::{Role, UserSummary};
use sample_depot_server::db::{PgStore, UserStore};
use sample_depot_server::services::{ServiceError, hash_password};

use super::{CliError, connect};

/// Create a user directly in the database.
///
/// Connected clients are not notified; they see the user on their next fetch.
///
/// # Errors
///
/// Returns `CliError` for an unknown role, a taken name or database failures.
pub async fn create(name: &str, role: &str, password: &str) -> Result<UserSummary, CliError> {
    let role: Role = role
        .parse()
        .map_err(|e: sample_depot_core::RoleParseError| ServiceError::Validation(e.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ServiceError::Validation("name is required".to_owned()).into());
    }

    let store = PgStore::new(connect().await?);
    tracing::info!("Creating user: {} ({})", name, role);

    let hash = hash_password(password)?;
    let user = store
        .insert_user(name, &hash, role)
        .await
        .map_err(ServiceError::from)?;

    tracing::info!(
        "User created successfully! ID: {}, Name: {}, Role: {}",
        user.id,
        user.name,
        user.role
    );
    Ok(user)
}
