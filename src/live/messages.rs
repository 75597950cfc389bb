//! Message envelope shared by every live transport.

use serde::{Deserialize, Serialize};

/// Server -> client message. `payload` depends on `msg_type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn empty(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::Value::Null,
        }
    }

    pub fn update_available(new_items: usize) -> Self {
        Self::new(msg_types::UPDATE, payloads::UpdateAvailable::new(new_items))
    }

    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(msg_types::ERROR, payloads::Error::new(code, message))
    }
}

/// Client -> server message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

pub mod payloads {
    use serde::{Deserialize, Serialize};

    /// Greeting sent once the connection is registered.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Connected {
        pub connection_id: String,
        pub account: String,
        pub server_version: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct UpdateAvailable {
        pub message: String,
        pub new_items: usize,
    }

    impl UpdateAvailable {
        pub fn new(new_items: usize) -> Self {
            Self {
                message: format!("{} new items available", new_items),
                new_items,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Error {
        pub code: String,
        pub message: String,
    }

    impl Error {
        pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
            Self {
                code: code.into(),
                message: message.into(),
            }
        }
    }
}

pub mod msg_types {
    /// Server greeting after registration.
    pub const CONNECTED: &str = "connected";
    /// Client heartbeat.
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const ERROR: &str = "error";
    /// New items were stored for the connection's account.
    pub const UPDATE: &str = "update";
    /// Client asks for an immediate sync of its account.
    pub const REFRESH: &str = "refresh";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_message_wire_format() {
        let json = serde_json::to_value(ServerMessage::update_available(3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "update",
                "payload": {"message": "3 new items available", "new_items": 3}
            })
        );
    }

    #[test]
    fn client_message_payload_is_optional() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"refresh"}"#).unwrap();
        assert_eq!(msg.msg_type, msg_types::REFRESH);
        assert_eq!(msg.payload, serde_json::Value::Null);
    }

    #[test]
    fn client_message_requires_type() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"payload":1}"#).is_err());
    }
}
