//! Outbound shipments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::{ShipmentId, UserId};

/// One shipped (sample, size, quantity) line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub sample_code: String,
    pub size_label: String,
    pub quantity: i32,
}

/// A shipment with its line items, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub recipient: String,
    pub courier: String,
    /// Creator, kept even if the user is later deleted.
    pub user_id: UserId,
    /// Creator's name as captured at creation time.
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub lines: Vec<ShipmentLine>,
}

/// A requested line: which box the quantity is drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentLineRequest {
    pub sample_code: String,
    pub size_label: String,
    pub box_number: String,
    pub quantity: i32,
}

/// Body of a shipment creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub recipient: String,
    pub courier: String,
    pub lines: Vec<ShipmentLineRequest>,
}
