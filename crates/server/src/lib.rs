//! Sample Depot server library.
//!
//! HTTP API, session authentication and the real-time event hub for the
//! sample depot. Exposed as a library so the CLI and the integration tests
//! can reuse the stores, services and hub.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod images;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod routes;
pub mod services;
pub mod state;
