//! Process-wide event fan-out with a targeted-delivery registry.
//!
//! Each connection gets one bounded queue shared by broadcast and targeted
//! events, so per-connection emission order is preserved. A full queue drops
//! the event for that connection only; producers never wait.
//!
//! A connection may register a user id. Registering binds that user to the
//! connection, replacing any earlier binding. The user id is also kept on the
//! connection entry, so disconnecting clears the binding directly, and only if
//! it still points at the disconnecting connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use sample_depot_core::UserId;
use sample_depot_core::events::ServerEvent;

/// Identity of one live event connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct Connection {
    tx: mpsc::Sender<Arc<ServerEvent>>,
    user: Option<UserId>,
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    users: HashMap<UserId, ConnectionId>,
}

struct HubInner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Publish handle shared by every mutation path and every socket.
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("connections", &self.connection_count())
            .field("capacity", &self.inner.capacity)
            .finish()
    }
}

impl EventHub {
    /// Create a hub whose connections each buffer up to `capacity` events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.inner
            .registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new connection. It stays registered until the subscription drops.
    #[must_use]
    pub fn connect(&self) -> Subscription {
        let id = ConnectionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.inner.capacity);
        self.registry()
            .connections
            .insert(id, Connection { tx, user: None });
        tracing::debug!(connection = %id, "Event connection opened");

        Subscription {
            id,
            rx,
            hub: self.clone(),
        }
    }

    /// Bind `user` to `connection`, overwriting any earlier binding.
    ///
    /// Returns `false` if the connection is already gone.
    pub fn register(&self, connection: ConnectionId, user: UserId) -> bool {
        let mut registry = self.registry();
        let previous = match registry.connections.get_mut(&connection) {
            Some(entry) => entry.user.replace(user),
            None => return false,
        };
        if let Some(previous) = previous.filter(|p| *p != user)
            && registry.users.get(&previous) == Some(&connection)
        {
            registry.users.remove(&previous);
        }
        if let Some(displaced) = registry.users.insert(user, connection)
            && displaced != connection
            && let Some(entry) = registry.connections.get_mut(&displaced)
        {
            // the older connection stays open but is no longer addressable
            entry.user = None;
        }
        tracing::info!(connection = %connection, user_id = %user, "User registered");
        true
    }

    /// Deliver to every connection. Returns how many queues accepted it.
    pub fn broadcast(&self, event: ServerEvent) -> usize {
        let event = Arc::new(event);
        let registry = self.registry();
        let mut delivered = 0;
        for (id, connection) in &registry.connections {
            if offer(*id, connection, &event) {
                delivered += 1;
            }
        }
        tracing::debug!(event = event.name(), delivered, "Broadcast");
        delivered
    }

    /// Deliver to the connection currently bound to `user`.
    ///
    /// Events for users with no bound connection are dropped silently.
    pub fn send_to_user(&self, user: UserId, event: ServerEvent) -> bool {
        let registry = self.registry();
        let Some(id) = registry.users.get(&user) else {
            tracing::debug!(user_id = %user, event = event.name(), "No connection for user");
            return false;
        };
        registry
            .connections
            .get(id)
            .is_some_and(|connection| offer(*id, connection, &Arc::new(event)))
    }

    /// The connection currently bound to `user`.
    #[must_use]
    pub fn connection_of(&self, user: UserId) -> Option<ConnectionId> {
        self.registry().users.get(&user).copied()
    }

    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.registry().connections.len()
    }

    fn disconnect(&self, connection: ConnectionId) {
        let mut registry = self.registry();
        let Some(entry) = registry.connections.remove(&connection) else {
            return;
        };
        if let Some(user) = entry.user
            && registry.users.get(&user) == Some(&connection)
        {
            registry.users.remove(&user);
        }
        tracing::debug!(connection = %connection, "Event connection closed");
    }
}

fn offer(id: ConnectionId, connection: &Connection, event: &Arc<ServerEvent>) -> bool {
    match connection.tx.try_send(Arc::clone(event)) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::warn!(connection = %id, event = event.name(), "Event queue full, dropping event");
            false
        }
        // receiver dropped; the entry is removed when its subscription drops
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

/// The receiving end of one connection. Dropping it disconnects.
pub struct Subscription {
    id: ConnectionId,
    rx: mpsc::Receiver<Arc<ServerEvent>>,
    hub: EventHub,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Subscription {
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Bind this connection to `user`.
    pub fn register(&self, user: UserId) -> bool {
        self.hub.register(self.id, user)
    }

    /// Wait for the next event.
    pub async fn recv(&mut self) -> Option<Arc<ServerEvent>> {
        self.rx.recv().await
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<ServerEvent>> {
        self.rx.try_recv().ok()
    }

    /// Take every queued event without waiting.
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        std::iter::from_fn(|| self.try_recv())
            .map(Arc::unwrap_or_clone)
            .collect()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}
