//! Subcommand implementations and their shared error type.

pub mod migrate;
pub mod seed;
pub mod user;
pub mod watch;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use sample_depot_server::db::{self, RepositoryError};
use sample_depot_server::services::ServiceError;

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CliError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store migration error: {0}")]
    SessionStore(String),

    #[error("{0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid server response: {0}")]
    Protocol(String),
}

/// `DEPOT_DATABASE_URL`, falling back to `DATABASE_URL`.
fn database_url() -> Result<SecretString, CliError> {
    dotenvy::dotenv().ok();

    std::env::var("DEPOT_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingEnvVar("DEPOT_DATABASE_URL"))
}

/// Connect to the depot database.
async fn connect() -> Result<PgPool, CliError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(db::create_pool(&database_url).await?)
}
