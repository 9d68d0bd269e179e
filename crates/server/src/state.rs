//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::db::PgStore;
use crate::images::ImageStore;
use crate::realtime::EventHub;
use crate::services::{InventoryService, UserService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    store: PgStore,
    hub: EventHub,
    images: ImageStore,
}

impl AppState {
    /// Build the state; the hub and image store are derived from `config`.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let hub = EventHub::new(config.event_queue_capacity);
        let images = ImageStore::new(config.image_dir.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                store: PgStore::new(pool),
                hub,
                images,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &PgStore {
        &self.inner.store
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        self.inner.store.pool()
    }

    #[must_use]
    pub fn hub(&self) -> &EventHub {
        &self.inner.hub
    }

    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.inner.images
    }

    /// Inventory operations bound to this state's store and hub.
    #[must_use]
    pub fn inventory(&self) -> InventoryService<'_, PgStore> {
        InventoryService::new(self.store(), self.hub())
    }

    /// User operations bound to this state's store and hub.
    #[must_use]
    pub fn users(&self) -> UserService<'_, PgStore> {
        UserService::new(self.store(), self.hub(), &self.inner.config.default_password)
    }
}
