//! Scripted hub model.
//!
//! `SimHub` reads what the device wrote to a [`SimTransport`], records it, and
//! answers according to its [`HubPolicy`]. Replies are queued for the device's
//! next poll, the same way a real hub's replies arrive on a later tick.

use dih_core::MessageIdGenerator;
use dih_proto::{DEFAULT_MAX_RECORD_LEN, Message, MessageKind, Payload, decode_line, encode_line};
use tracing::debug;

use crate::sim_transport::SimTransport;

/// Identity the hub puts on messages it originates.
pub const HUB_ID: &str = "hub";

/// How the hub answers device requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubPolicy {
    /// Ack Register requests
    pub ack_register: bool,
    /// Nack Register requests instead of acking them
    pub reject_register: bool,
    /// Ack Heartbeats
    pub ack_heartbeat: bool,
    /// Ack Data messages
    pub ack_data: bool,
}

impl Default for HubPolicy {
    fn default() -> Self {
        Self { ack_register: true, reject_register: false, ack_heartbeat: true, ack_data: true }
    }
}

impl HubPolicy {
    /// Hub that never answers anything.
    pub fn silent() -> Self {
        Self { ack_register: false, reject_register: false, ack_heartbeat: false, ack_data: false }
    }
}

/// Simulated hub on the far end of a [`SimTransport`].
#[derive(Debug)]
pub struct SimHub {
    transport: SimTransport,
    policy: HubPolicy,
    ids: MessageIdGenerator,
    received: Vec<Message>,
    garbage: usize,
}

impl SimHub {
    /// Hub attached to `transport` with the default (cooperative) policy.
    pub fn new(transport: SimTransport) -> Self {
        Self {
            transport,
            policy: HubPolicy::default(),
            ids: MessageIdGenerator::new(0x0000_4ab0),
            received: Vec::new(),
            garbage: 0,
        }
    }

    /// Replace the answering policy.
    pub fn set_policy(&mut self, policy: HubPolicy) {
        self.policy = policy;
    }

    /// Current policy.
    pub fn policy(&self) -> HubPolicy {
        self.policy
    }

    /// Read everything the device sent and queue replies. Returns the
    /// messages read in this step.
    pub fn step(&mut self) -> Vec<Message> {
        let mut batch = Vec::new();

        for line in self.transport.take_sent() {
            let Ok(message) = decode_line(&line, DEFAULT_MAX_RECORD_LEN) else {
                self.garbage += 1;
                continue;
            };

            debug!(kind = %message.kind, message_id = %message.message_id, "hub received");
            if let Some(reply) = self.reply_to(&message) {
                self.push(&reply);
            }
            batch.push(message);
        }

        self.received.extend(batch.iter().cloned());
        batch
    }

    /// Every message received so far.
    pub fn received(&self) -> &[Message] {
        &self.received
    }

    /// Received messages of one kind.
    pub fn received_of(&self, kind: MessageKind) -> Vec<&Message> {
        self.received.iter().filter(|m| m.kind == kind).collect()
    }

    /// Records from the device that failed to decode.
    pub fn garbage(&self) -> usize {
        self.garbage
    }

    /// Push a data message to the device. Returns its id.
    pub fn send_data(&mut self, payload: Payload) -> String {
        let message = Message::data(HUB_ID, self.ids.next_id(), payload);
        self.push(&message);
        message.message_id.to_string()
    }

    /// Push a command to the device. Returns its id.
    pub fn send_command(&mut self, payload: Payload) -> String {
        let message = Message::command(HUB_ID, self.ids.next_id(), payload);
        self.push(&message);
        message.message_id.to_string()
    }

    /// Push an arbitrary message to the device.
    pub fn send(&mut self, message: &Message) {
        self.push(message);
    }

    fn reply_to(&self, message: &Message) -> Option<Message> {
        let id = message.message_id.clone();
        match message.kind {
            MessageKind::Register if self.policy.reject_register => {
                Some(Message::nack(&message.device_id, id))
            },
            MessageKind::Register if self.policy.ack_register => {
                Some(Message::ack(&message.device_id, id))
            },
            MessageKind::Heartbeat if self.policy.ack_heartbeat => {
                Some(Message::ack(&message.device_id, id))
            },
            MessageKind::Data if self.policy.ack_data => Some(Message::ack(&message.device_id, id)),
            _ => None,
        }
    }

    fn push(&self, message: &Message) {
        if let Ok(line) = encode_line(message, DEFAULT_MAX_RECORD_LEN) {
            self.transport.inject_line(line);
        }
    }
}
