//! Protocol message types.
//!
//! Every line on the wire is a [`Message`]. The `type` field selects the
//! [`MessageKind`]; `message_id` correlates a request with its acknowledgement
//! and carries no ordering meaning.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Flat key/value payload carried by `data` and `command` messages.
///
/// Ordered so that encoding is deterministic.
pub type Payload = BTreeMap<String, String>;

/// Message type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Device asks the hub to register its identity
    Register,
    /// Device announces it is leaving
    Deregister,
    /// Application data (acknowledged by the receiver)
    Data,
    /// Application command (fire-and-forget)
    Command,
    /// Positive acknowledgement of `message_id`
    Ack,
    /// Rejection
    Nack,
    /// Liveness check
    Heartbeat,
}

impl MessageKind {
    /// Wire name of this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Deregister => "deregister",
            Self::Data => "data",
            Self::Command => "command",
            Self::Ack => "ack",
            Self::Nack => "nack",
            Self::Heartbeat => "heartbeat",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque correlation token.
///
/// Only compared for equality. Must be unique among requests that are in
/// flight at the same time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wrap an existing token.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single protocol message.
///
/// # Invariants
///
/// - `payload` is `Some` only for [`MessageKind::Data`] and
///   [`MessageKind::Command`] when built with the constructors below. Decoding
///   accepts whatever the peer sent.
/// - `device_id` defaults to empty on decode; hubs commonly omit it from
///   acknowledgements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message type
    #[serde(rename = "type")]
    pub kind: MessageKind,

    /// Identity of the device this message concerns
    #[serde(default)]
    pub device_id: String,

    /// Correlation token
    pub message_id: MessageId,

    /// Key/value payload for data and command messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Message {
    fn bare(kind: MessageKind, device_id: &str, message_id: MessageId) -> Self {
        Self { kind, device_id: device_id.to_owned(), message_id, payload: None }
    }

    /// Registration request.
    pub fn register(device_id: &str, message_id: MessageId) -> Self {
        Self::bare(MessageKind::Register, device_id, message_id)
    }

    /// Deregistration notice.
    pub fn deregister(device_id: &str, message_id: MessageId) -> Self {
        Self::bare(MessageKind::Deregister, device_id, message_id)
    }

    /// Liveness check.
    pub fn heartbeat(device_id: &str, message_id: MessageId) -> Self {
        Self::bare(MessageKind::Heartbeat, device_id, message_id)
    }

    /// Acknowledgement of `message_id`.
    pub fn ack(device_id: &str, message_id: MessageId) -> Self {
        Self::bare(MessageKind::Ack, device_id, message_id)
    }

    /// Rejection of `message_id`.
    pub fn nack(device_id: &str, message_id: MessageId) -> Self {
        Self::bare(MessageKind::Nack, device_id, message_id)
    }

    /// Application data.
    pub fn data(device_id: &str, message_id: MessageId, payload: Payload) -> Self {
        Self { payload: Some(payload), ..Self::bare(MessageKind::Data, device_id, message_id) }
    }

    /// Application command.
    pub fn command(device_id: &str, message_id: MessageId, payload: Payload) -> Self {
        Self { payload: Some(payload), ..Self::bare(MessageKind::Command, device_id, message_id) }
    }

    /// Payload, or an empty map when the message carries none.
    pub fn payload_or_empty(&self) -> Payload {
        self.payload.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_match_wire() {
        let kinds = [
            MessageKind::Register,
            MessageKind::Deregister,
            MessageKind::Data,
            MessageKind::Command,
            MessageKind::Ack,
            MessageKind::Nack,
            MessageKind::Heartbeat,
        ];

        for kind in kinds {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn only_data_and_command_carry_payload() {
        let id = MessageId::from("1");
        assert!(Message::register("dev", id.clone()).payload.is_none());
        assert!(Message::heartbeat("dev", id.clone()).payload.is_none());
        assert!(Message::ack("dev", id.clone()).payload.is_none());
        assert!(Message::data("dev", id.clone(), Payload::new()).payload.is_some());
        assert!(Message::command("dev", id, Payload::new()).payload.is_some());
    }
}
