//! Integration tests for Sample Depot.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p sample-depot-integration-tests
//!
//! # Include the tests that need a running server
//! cargo test -p sample-depot-integration-tests -- --include-ignored
//! ```
//!
//! # Test Categories
//!
//! - `inventory_events` - sample and size mutations and the events they publish
//! - `shipments` - stock decrements and atomic failure
//! - `targeted_delivery` - per-user events through the connection registry
//! - `cache_convergence` - client caches tracking the store through events
//! - `server` - HTTP smoke tests against a live server (ignored by default)
//!
//! Everything except `server` runs on the in-memory store with a live
//! [`EventHub`], so no database is needed.

use secrecy::SecretString;

use sample_depot_core::cache::{Applied, ClientCache, Snapshot};
use sample_depot_core::events::ServerEvent;
use sample_depot_core::{Role, ShelfPlacement, UserSummary};
use sample_depot_server::db::{InventoryStore, MemoryStore, UserStore};
use sample_depot_server::realtime::{EventHub, Subscription};
use sample_depot_server::services::{
    InventoryService, NewSample, SizeInput, UserService, hash_password,
};

/// Password given to users created through [`TestDepot::users`].
pub const DEFAULT_PASSWORD: &str = "azira";

/// An in-memory depot: store, hub and the services over them.
pub struct TestDepot {
    pub store: MemoryStore,
    pub hub: EventHub,
    default_password: SecretString,
}

impl Default for TestDepot {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDepot {
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: MemoryStore::new(),
            hub: EventHub::new(64),
            default_password: SecretString::from(DEFAULT_PASSWORD),
        }
    }

    #[must_use]
    pub const fn inventory(&self) -> InventoryService<'_, MemoryStore> {
        InventoryService::new(&self.store, &self.hub)
    }

    #[must_use]
    pub const fn users(&self) -> UserService<'_, MemoryStore> {
        UserService::new(&self.store, &self.hub, &self.default_password)
    }

    /// Insert a user directly, without publishing anything.
    ///
    /// # Panics
    ///
    /// Panics if the name is taken.
    pub async fn user(&self, name: &str, role: Role) -> UserSummary {
        let hash = hash_password(DEFAULT_PASSWORD).unwrap_or_default();
        match self.store.insert_user(name, &hash, role).await {
            Ok(user) => user,
            Err(e) => panic!("failed to insert {name}: {e}"),
        }
    }

    /// Create a sample through the service.
    ///
    /// # Panics
    ///
    /// Panics if the sample cannot be created.
    pub async fn sample(&self, code: &str) {
        let created = self
            .inventory()
            .create_sample(NewSample {
                code: Some(code.to_owned()),
                ..NewSample::default()
            })
            .await;
        assert!(created.is_ok(), "failed to create {code}: {created:?}");
    }

    /// Create a size through the service and return its id.
    ///
    /// # Panics
    ///
    /// Panics if the size cannot be created.
    pub async fn size(
        &self,
        code: &str,
        label: &str,
        box_number: &str,
        quantity: i32,
        placement: &ShelfPlacement,
    ) -> sample_depot_core::SizeId {
        let created = self
            .inventory()
            .create_size(SizeInput {
                sample_code: Some(code.to_owned()),
                box_number: Some(box_number.to_owned()),
                size_label: Some(label.to_owned()),
                quantity: Some(quantity),
                shelf_id: Some(placement.shelf_id.clone()),
                section: Some(placement.section),
                level: Some(placement.level),
            })
            .await;
        match created {
            Ok(size) => size.id,
            Err(e) => panic!("failed to create size {code}/{label}: {e}"),
        }
    }

    /// Everything a client fetches on startup, seen as `current_user`.
    ///
    /// # Panics
    ///
    /// Panics if the store fails.
    pub async fn snapshot(&self, current_user: Option<UserSummary>) -> Snapshot {
        let fetched = async {
            Ok::<_, sample_depot_server::db::RepositoryError>(Snapshot {
                samples: self.store.list_samples().await?,
                sizes: self.store.list_sizes().await?,
                shipments: self.store.list_shipments().await?,
                users: self.store.list_users().await?,
                current_user,
            })
        };
        match fetched.await {
            Ok(snapshot) => snapshot,
            Err(e) => panic!("snapshot failed: {e}"),
        }
    }

    /// Connect a client: subscribe, register and snapshot.
    ///
    /// # Panics
    ///
    /// Panics if the store fails.
    pub async fn client(&self, user: &UserSummary) -> TestClient {
        // subscribe first so nothing published after the snapshot is missed
        let subscription = self.hub.connect();
        subscription.register(user.id);
        let cache = ClientCache::from_snapshot(self.snapshot(Some(user.clone())).await);
        TestClient {
            subscription,
            cache,
        }
    }
}

/// A connected client: its event queue and its cache.
pub struct TestClient {
    pub subscription: Subscription,
    pub cache: ClientCache,
}

impl TestClient {
    /// Apply every queued event, returning the events with their outcomes.
    pub fn sync(&mut self) -> Vec<(ServerEvent, Applied)> {
        self.subscription
            .drain()
            .into_iter()
            .map(|event| {
                let applied = self.cache.apply(&event);
                (event, applied)
            })
            .collect()
    }
}

/// A placement on the default shelf layout.
#[must_use]
pub fn placement(shelf_id: &str, section: i32, level: i32) -> ShelfPlacement {
    ShelfPlacement {
        shelf_id: shelf_id.to_owned(),
        section,
        level,
    }
}

/// Names of the given events, in order.
#[must_use]
pub fn names(events: &[ServerEvent]) -> Vec<&'static str> {
    events.iter().map(ServerEvent::name).collect()
}
