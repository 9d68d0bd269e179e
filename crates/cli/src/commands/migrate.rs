//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! depot-cli migrate
//! ```
//!
//! Applies `crates/server/migrations/` and creates the session table used by
//! tower-sessions.

use tower_sessions_sqlx_store::PostgresStore;

use super::{CliError, connect};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;

    tracing::info!("Running depot migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool)
        .migrate()
        .await
        .map_err(|e| CliError::SessionStore(e.to_string()))?;

    tracing::info!("Migrations complete!");
    Ok(())
}
