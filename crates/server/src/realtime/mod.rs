//! Real-time delivery of mutation events.
//!
//! - [`hub`] - fan-out and the user-to-connection registry
//! - [`socket`] - the `/api/events` WebSocket endpoint
//! - [`monitor`] - database reachability broadcasts

pub mod hub;
pub mod monitor;
pub mod socket;

pub use hub::{ConnectionId, EventHub, Subscription};
pub use monitor::spawn_db_monitor;
