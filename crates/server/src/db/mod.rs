//! Persistence for the depot.
//!
//! # Tables
//!
//! - `samples` - Product references keyed by their (mutable) code
//! - `sizes` - Box/size/quantity/placement records, cascading with their sample
//! - `shelves` - The fixed shelf layout
//! - `shipments` / `shipment_lines` - Outbound shipments and their line items
//! - `users` - Depot accounts with argon2 password hashes
//! - `tower_sessions.session` - Session storage
//!
//! The services talk to the store through [`InventoryStore`] and [`UserStore`].
//! [`PgStore`] is the production implementation; [`MemoryStore`] backs tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p sample-depot-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use sample_depot_core::{
    Role, Sample, Shelf, ShelfPlacement, Shipment, ShipmentRequest, Size, SizeId, UserId,
    UserSummary,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (duplicate key, insufficient stock).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Create the pool, retrying every `interval` until the database answers.
pub async fn connect_with_retry(database_url: &secrecy::SecretString, interval: Duration) -> PgPool {
    let mut attempt: u32 = 0;
    loop {
        match create_pool(database_url).await {
            Ok(pool) => {
                tracing::info!(attempt, "Database pool created");
                return pool;
            }
            Err(e) => {
                tracing::warn!(
                    attempt,
                    error = %e,
                    retry_in_secs = interval.as_secs(),
                    "Database unreachable, retrying"
                );
                attempt = attempt.saturating_add(1);
                tokio::time::sleep(interval).await;
            }
        }
    }
}

// =============================================================================
// Store inputs
// =============================================================================

/// A size record to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSize {
    pub sample_code: String,
    pub box_number: String,
    pub size_label: String,
    pub quantity: i32,
    pub placement: ShelfPlacement,
}

/// A validated change to one size record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SizeChange {
    /// Unassign the record: no box, no placement, quantity zero.
    /// The label is replaced only when given.
    Clear { size_label: Option<String> },
    /// Set every field; the placement spreads to the rest of the box.
    Assign {
        box_number: String,
        size_label: String,
        quantity: i32,
        placement: ShelfPlacement,
    },
}

/// A shipment to record, with its creator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShipment {
    pub user_id: UserId,
    pub user_name: String,
    pub request: ShipmentRequest,
}

// =============================================================================
// Store capabilities
// =============================================================================

/// Samples, sizes, shelves and shipments.
///
/// Every method is one atomic unit: multi-step writes either commit fully or
/// leave the store untouched.
pub trait InventoryStore: Send + Sync {
    fn list_samples(&self) -> impl Future<Output = Result<Vec<Sample>, RepositoryError>> + Send;

    fn get_sample(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Option<Sample>, RepositoryError>> + Send;

    /// Insert a sample. `Conflict` if the code is taken.
    fn insert_sample(
        &self,
        sample: &Sample,
    ) -> impl Future<Output = Result<Sample, RepositoryError>> + Send;

    /// Change a sample's code; its sizes follow. `Conflict` if `new_code` is taken.
    fn rename_sample(
        &self,
        old_code: &str,
        new_code: &str,
    ) -> impl Future<Output = Result<Sample, RepositoryError>> + Send;

    fn set_description(
        &self,
        code: &str,
        description: Option<&str>,
    ) -> impl Future<Output = Result<Sample, RepositoryError>> + Send;

    fn set_image(
        &self,
        code: &str,
        image: &str,
    ) -> impl Future<Output = Result<Sample, RepositoryError>> + Send;

    /// Delete a sample and its sizes, returning the removed sample.
    fn delete_sample(
        &self,
        code: &str,
    ) -> impl Future<Output = Result<Sample, RepositoryError>> + Send;

    fn list_sizes(&self) -> impl Future<Output = Result<Vec<Size>, RepositoryError>> + Send;

    fn sizes_of(
        &self,
        sample_code: &str,
    ) -> impl Future<Output = Result<Vec<Size>, RepositoryError>> + Send;

    fn sizes_in_box(
        &self,
        box_number: &str,
    ) -> impl Future<Output = Result<Vec<Size>, RepositoryError>> + Send;

    /// Insert a size. `NotFound` if the sample does not exist.
    fn insert_size(
        &self,
        size: &NewSize,
    ) -> impl Future<Output = Result<Size, RepositoryError>> + Send;

    /// Apply a change and return every record it touched: the whole box for an
    /// assignment, the single record for a clear.
    fn update_size(
        &self,
        id: SizeId,
        change: &SizeChange,
    ) -> impl Future<Output = Result<Vec<Size>, RepositoryError>> + Send;

    fn delete_size(&self, id: SizeId) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn list_shelves(&self) -> impl Future<Output = Result<Vec<Shelf>, RepositoryError>> + Send;

    /// Shipment history, newest first.
    fn list_shipments(&self)
    -> impl Future<Output = Result<Vec<Shipment>, RepositoryError>> + Send;

    /// Record a shipment and draw its quantities from stock.
    ///
    /// Returns the shipment and the decremented size records. `Conflict` if a
    /// line matches no size or exceeds the stock of its size.
    fn create_shipment(
        &self,
        shipment: &NewShipment,
    ) -> impl Future<Output = Result<(Shipment, Vec<Size>), RepositoryError>> + Send;
}

/// Depot accounts.
pub trait UserStore: Send + Sync {
    fn list_users(&self) -> impl Future<Output = Result<Vec<UserSummary>, RepositoryError>> + Send;

    fn get_user(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<UserSummary>, RepositoryError>> + Send;

    /// A user and their password hash, looked up by name.
    fn find_credentials(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Option<(UserSummary, String)>, RepositoryError>> + Send;

    fn password_hash(
        &self,
        id: UserId,
    ) -> impl Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Insert a user. `Conflict` if the name is taken.
    fn insert_user(
        &self,
        name: &str,
        password_hash: &str,
        role: Role,
    ) -> impl Future<Output = Result<UserSummary, RepositoryError>> + Send;

    fn set_role(
        &self,
        id: UserId,
        role: Role,
    ) -> impl Future<Output = Result<UserSummary, RepositoryError>> + Send;

    fn set_password(
        &self,
        id: UserId,
        password_hash: &str,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Rename a user. `Conflict` if the name is taken.
    fn rename_user(
        &self,
        id: UserId,
        name: &str,
    ) -> impl Future<Output = Result<UserSummary, RepositoryError>> + Send;

    fn delete_user(&self, id: UserId) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
