//! Server-side models that are not shared with clients.

pub mod session;

pub use session::{CurrentUser, keys as session_keys};
