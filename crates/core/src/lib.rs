//! Sample Depot Core - Shared types library.
//!
//! This crate provides the types used across all Sample Depot components:
//! - `server` - HTTP API and real-time event hub
//! - `cli` - Command-line tools for migrations, seeding and event watching
//!
//! # Architecture
//!
//! The core crate contains only types and pure state logic - no I/O, no
//! database access, no HTTP clients. This keeps it usable on both ends of the
//! event socket.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs and the inventory, shipment and user entities
//! - [`events`] - The server-to-client event protocol
//! - [`cache`] - Client-side state cache and the reconciliation rules

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod events;
pub mod types;

pub use types::*;
