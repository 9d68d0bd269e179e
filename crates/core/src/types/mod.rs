//! Core types for Sample Depot.
//!
//! This module provides type-safe wrappers and the domain entities shared by
//! the server, the CLI and the client cache.

pub mod id;
pub mod inventory;
pub mod role;
pub mod shipment;
pub mod user;

pub use id::*;
pub use inventory::{
    MISSING_IMAGE, Sample, Shelf, ShelfPlacement, Size, default_shelves, is_custom_image,
};
pub use role::{Role, RoleParseError};
pub use shipment::{Shipment, ShipmentLine, ShipmentLineRequest, ShipmentRequest};
pub use user::UserSummary;
