//! Real-time event protocol between the server and connected clients.
//!
//! Every frame the server pushes is a JSON object of the form
//! `{"event": "<name>", "data": <payload>}`:
//!
//! ```text
//! {"event":"size-updated","data":{"id":3,"sample_code":"A123","box_number":"B7",...}}
//! {"event":"sample-deleted","data":{"code":"A123"}}
//! ```
//!
//! Clients send `{"type": "register", "user_id": <id>}` once after connecting so
//! that user-specific events (`role-changed`, `force-logout`) can reach them.

use serde::{Deserialize, Serialize};

use crate::types::{Role, Sample, Shipment, Size, SizeId, UserId, UserSummary};

/// A change pushed from the server after a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    SampleAdded(Sample),
    SampleUpdated(SampleUpdate),
    SampleDeleted { code: String },
    SizeAdded(Size),
    SizeUpdated(Size),
    SizeDeleted { id: SizeId },
    ShippingCreated(Shipment),
    UserAdded(UserSummary),
    UserDeleted { id: UserId },
    /// Broadcast so user lists refresh.
    RoleUpdated { id: UserId, role: Role },
    /// Targeted at the user whose role changed.
    RoleChanged { role: Role },
    UserRenamed { id: UserId, name: String },
    /// Targeted at a user whose account was removed.
    ForceLogout { reason: String },
    DbStatus { connected: bool },
}

impl ServerEvent {
    /// Wire name of the event, as it appears in the `event` field.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SampleAdded(_) => "sample-added",
            Self::SampleUpdated(_) => "sample-updated",
            Self::SampleDeleted { .. } => "sample-deleted",
            Self::SizeAdded(_) => "size-added",
            Self::SizeUpdated(_) => "size-updated",
            Self::SizeDeleted { .. } => "size-deleted",
            Self::ShippingCreated(_) => "shipping-created",
            Self::UserAdded(_) => "user-added",
            Self::UserDeleted { .. } => "user-deleted",
            Self::RoleUpdated { .. } => "role-updated",
            Self::RoleChanged { .. } => "role-changed",
            Self::UserRenamed { .. } => "user-renamed",
            Self::ForceLogout { .. } => "force-logout",
            Self::DbStatus { .. } => "db-status",
        }
    }
}

/// Which field of a sample changed.
///
/// A rename carries both codes so receivers can locate the entry by the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", rename_all = "snake_case")]
pub enum SampleUpdate {
    Code { old_code: String, new_code: String },
    Description { code: String, description: Option<String> },
    Image { code: String, image: String },
}

impl SampleUpdate {
    /// The sample's code after the change.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Code { new_code, .. } => new_code,
            Self::Description { code, .. } | Self::Image { code, .. } => code,
        }
    }
}

/// A frame sent by a client over the event socket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Bind this connection to a user for targeted delivery.
    Register { user_id: UserId },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = ServerEvent::SampleDeleted {
            code: "A123".to_owned(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event": "sample-deleted", "data": {"code": "A123"}})
        );
        assert_eq!(value["event"], event.name());
    }

    #[test]
    fn test_rename_carries_both_codes() {
        let event = ServerEvent::SampleUpdated(SampleUpdate::Code {
            old_code: "A1".to_owned(),
            new_code: "A2".to_owned(),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "event": "sample-updated",
                "data": {"field": "code", "old_code": "A1", "new_code": "A2"}
            })
        );
    }

    #[test]
    fn test_names_match_serialized_tags() {
        let events = [
            ServerEvent::RoleChanged { role: Role::Admin },
            ServerEvent::DbStatus { connected: false },
            ServerEvent::ForceLogout {
                reason: "bye".to_owned(),
            },
            ServerEvent::SizeDeleted { id: SizeId::new(4) },
        ];
        for event in events {
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["event"], event.name());
        }
    }

    #[test]
    fn test_client_register_parses() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"register","user_id":9}"#).unwrap();
        assert_eq!(
            message,
            ClientMessage::Register {
                user_id: UserId::new(9)
            }
        );
    }

    #[test]
    fn test_update_code_is_current_code() {
        let rename = SampleUpdate::Code {
            old_code: "OLD".to_owned(),
            new_code: "NEW".to_owned(),
        };
        assert_eq!(rename.code(), "NEW");
    }
}
