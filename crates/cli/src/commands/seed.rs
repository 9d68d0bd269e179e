//! Seed the shelf layout and the first admin account.
//!
//! Safe to run repeatedly: existing shelves are kept and the admin is only
//! created while the user table is empty.

use sample_depot_core::{Role, default_shelves};
use sample_depot_server::db::{PgStore, UserStore};
use sample_depot_server::services::hash_password;

use super::{CliError, connect};

/// Name of the account created on an empty database.
pub const INITIAL_ADMIN: &str = "admin";

/// Insert missing shelves and, on an empty database, an admin account.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a write fails.
pub async fn run(admin_password: &str) -> Result<(), CliError> {
    let store = PgStore::new(connect().await?);

    let added = store.seed_shelves(&default_shelves()).await?;
    tracing::info!(added, "Shelves seeded");

    if store.count_users().await? > 0 {
        tracing::info!("Users exist, skipping initial admin");
        return Ok(());
    }

    let hash = hash_password(admin_password)?;
    let admin = store.insert_user(INITIAL_ADMIN, &hash, Role::Admin).await?;
    tracing::info!(user_id = %admin.id, name = %admin.name, "Initial admin created");
    tracing::warn!("Change the initial admin password after the first login");
    Ok(())
}
