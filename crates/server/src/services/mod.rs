//! Business logic between the routes and the store.
//!
//! Services validate input, write through a store trait and, once the write
//! has committed, publish the resulting events on the hub.

pub mod error;
pub mod inventory;
pub mod password;
pub mod users;

pub use error::ServiceError;
pub use inventory::{InventoryService, NewSample, SizeInput, SizeUpdate};
pub use password::{hash_password, verify_password};
pub use users::UserService;
