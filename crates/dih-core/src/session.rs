//! Device session state machine.
//!
//! Manages registration, retry, heartbeat supervision and inbound dispatch.
//! Uses the action pattern: methods take time as input and return actions for
//! the driver to execute. The state machine performs no I/O and never reads a
//! clock.
//!
//! # State Machine
//!
//! ```text
//!                 retry elapsed              Ack(register id)
//! ┌──────────────┐ ──────────> ┌─────────────┐ ─────────────> ┌────────────┐
//! │ Disconnected │             │ Registering │                │ Registered │
//! └──────────────┘ <────────── └─────────────┘                └────────────┘
//!        ↑          retry elapsed / Nack                             │
//!        └───────────────────────────────────────────────────────────┘
//!                    heartbeat timeout / Nack / deregister
//! ```
//!
//! # Invariants
//!
//! - `is_registered()` is true iff the state is `Registered`.
//! - A registration id is pending only while `Registering`; a heartbeat id is
//!   pending only while `Registered`. At most one request awaits an ack.
//! - Heartbeats are only sent while `Registered` with no heartbeat outstanding.
//! - Entering `Disconnected` orphans every pending id, so late acks are
//!   ignored.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use dih_proto::{Message, MessageId, MessageKind, Payload};
use tracing::debug;

use crate::{
    config::SessionConfig,
    error::SessionError,
    event::{DropReason, SessionEvent},
    heartbeat::{HeartbeatOutcome, HeartbeatSupervisor},
    message_id::MessageIdGenerator,
};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No session with the hub. Registration is attempted once the retry
    /// interval has elapsed.
    Disconnected,
    /// Register sent, waiting for its Ack
    Registering,
    /// Registration acknowledged; heartbeats running
    Registered,
}

/// Actions returned by the session state machine.
///
/// The driver executes these in order:
/// - `Send`: encode and write the message to the transport
/// - `DeliverData` / `DeliverCommand`: invoke the host's sink
/// - `Notify`: report the event to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send this message to the hub
    Send(Message),
    /// Hand an inbound data payload to the host
    DeliverData(Payload),
    /// Hand an inbound command payload to the host
    DeliverCommand(Payload),
    /// Report an event
    Notify(SessionEvent),
}

/// Device session state machine.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Session<I = Instant>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    state: ConnectionState,
    config: SessionConfig,
    device_id: String,
    ids: MessageIdGenerator,
    /// Time of the last registration attempt. `None` until the first one, so
    /// the very first tick registers immediately.
    last_attempt: Option<I>,
    /// Correlation id of the outstanding Register
    pending_register: Option<MessageId>,
    heartbeat: HeartbeatSupervisor<I>,
    /// Last time the hub proved it was alive
    last_seen: Option<I>,
    /// Cleared by deregistration, set again by an explicit registration
    auto_register: bool,
}

impl<I> Session<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a session in [`ConnectionState::Disconnected`].
    ///
    /// `device_id` may be empty here but must be set through
    /// [`Session::set_device_id`] before the first tick.
    pub fn new(device_id: impl Into<String>, config: SessionConfig, ids: MessageIdGenerator) -> Self {
        let heartbeat =
            HeartbeatSupervisor::new(config.heartbeat_interval, config.heartbeat_ack_timeout);
        Self {
            state: ConnectionState::Disconnected,
            config,
            device_id: device_id.into(),
            ids,
            last_attempt: None,
            pending_register: None,
            heartbeat,
            last_seen: None,
            auto_register: true,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// True iff the state is [`ConnectionState::Registered`].
    pub fn is_registered(&self) -> bool {
        self.state == ConnectionState::Registered
    }

    /// Device identity sent with every message
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Set the device identity.
    ///
    /// Takes effect for the next message sent.
    pub fn set_device_id(&mut self, device_id: impl Into<String>) {
        self.device_id = device_id.into();
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Correlation id of the outstanding Register, if any.
    pub fn pending_register_id(&self) -> Option<&MessageId> {
        self.pending_register.as_ref()
    }

    /// Correlation id of the outstanding Heartbeat, if any.
    pub fn pending_heartbeat_id(&self) -> Option<&MessageId> {
        self.heartbeat.pending_id()
    }

    /// True while a heartbeat awaits its ack.
    pub fn is_awaiting_heartbeat_ack(&self) -> bool {
        self.heartbeat.is_awaiting()
    }

    /// Last time the hub acknowledged a registration or heartbeat.
    pub fn last_seen(&self) -> Option<I> {
        self.last_seen
    }

    /// False after deregistration until registration is requested again.
    pub fn auto_register(&self) -> bool {
        self.auto_register
    }

    /// Process periodic maintenance (registration retry and heartbeats).
    ///
    /// Emits at most one Register or Heartbeat per call.
    pub fn tick(&mut self, now: I) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if self.state == ConnectionState::Registering
            && let Some(elapsed) = self.retry_elapsed(now)
        {
            actions.push(SessionAction::Notify(SessionEvent::RegistrationTimedOut { elapsed }));
            self.transition(ConnectionState::Disconnected, &mut actions);
            // Falls through: the retry interval has elapsed, so the
            // Disconnected arm re-registers in this same tick.
        }

        match self.state {
            ConnectionState::Disconnected => {
                if self.auto_register && self.retry_elapsed(now).is_some() {
                    self.start_registration(now, &mut actions);
                }
            },
            ConnectionState::Registering => {},
            ConnectionState::Registered => match self.heartbeat.poll(now) {
                HeartbeatOutcome::Idle => {},
                HeartbeatOutcome::Due => {
                    let id = self.ids.next_id();
                    debug!(message_id = %id, "sending heartbeat");
                    self.heartbeat.record_sent(id.clone(), now);
                    actions.push(SessionAction::Send(Message::heartbeat(&self.device_id, id)));
                },
                HeartbeatOutcome::PeerLost { elapsed } => {
                    actions.push(SessionAction::Notify(SessionEvent::PeerLost { elapsed }));
                    self.transition(ConnectionState::Disconnected, &mut actions);
                },
            },
        }

        actions
    }

    /// Request registration now (host use).
    ///
    /// Sends a Register immediately with a fresh id and re-enables automatic
    /// registration after a [`Session::deregister`]. While `Registering`, the
    /// outstanding attempt is replaced.
    ///
    /// # Errors
    ///
    /// - `SessionError::AlreadyRegistered` if the session is registered
    pub fn register(&mut self, now: I) -> Result<Vec<SessionAction>, SessionError> {
        if self.is_registered() {
            return Err(SessionError::AlreadyRegistered);
        }

        self.auto_register = true;
        let mut actions = Vec::new();
        self.start_registration(now, &mut actions);
        Ok(actions)
    }

    /// Leave the hub (host use).
    ///
    /// Always sends a Deregister, without waiting for an ack. The session
    /// drops to `Disconnected`, orphans pending ids, and stops registering
    /// automatically until [`Session::register`] is called.
    pub fn deregister(&mut self) -> Vec<SessionAction> {
        self.auto_register = false;

        let id = self.ids.next_id();
        debug!(message_id = %id, "sending deregister");

        let mut actions = vec![SessionAction::Send(Message::deregister(&self.device_id, id))];
        self.transition(ConnectionState::Disconnected, &mut actions);
        actions
    }

    /// Send a single key/value data message.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotRegistered` unless registered
    pub fn send_data(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Vec<SessionAction>, SessionError> {
        let entry: (String, String) = (key.into(), value.into());
        self.send_payload(Payload::from([entry]))
    }

    /// Send a data message with an arbitrary payload.
    ///
    /// Data is fire-and-forget from the device side: acks from the hub are not
    /// tracked and no resend is attempted.
    ///
    /// # Errors
    ///
    /// - `SessionError::NotRegistered` unless registered
    pub fn send_payload(&mut self, payload: Payload) -> Result<Vec<SessionAction>, SessionError> {
        if !self.is_registered() {
            return Err(SessionError::NotRegistered { state: self.state });
        }

        let id = self.ids.next_id();
        Ok(vec![SessionAction::Send(Message::data(&self.device_id, id, payload))])
    }

    /// Process an inbound message and update state.
    pub fn handle_message(&mut self, message: &Message, now: I) -> Vec<SessionAction> {
        match message.kind {
            MessageKind::Ack => self.handle_ack(&message.message_id, now),
            MessageKind::Nack => self.handle_nack(&message.message_id),
            MessageKind::Data => {
                if let Some(dropped) = self.gate(message) {
                    return vec![dropped];
                }
                vec![
                    SessionAction::DeliverData(message.payload_or_empty()),
                    SessionAction::Send(Message::ack(&self.device_id, message.message_id.clone())),
                ]
            },
            MessageKind::Command => {
                if let Some(dropped) = self.gate(message) {
                    return vec![dropped];
                }
                vec![SessionAction::DeliverCommand(message.payload_or_empty())]
            },
            MessageKind::Register | MessageKind::Deregister | MessageKind::Heartbeat => {
                vec![SessionAction::Notify(SessionEvent::InboundDropped {
                    kind: message.kind,
                    message_id: message.message_id.clone(),
                    reason: DropReason::UnexpectedKind,
                })]
            },
        }
    }

    fn handle_ack(&mut self, id: &MessageId, now: I) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        if self.state == ConnectionState::Registering && self.pending_register.as_ref() == Some(id)
        {
            self.pending_register = None;
            self.last_seen = Some(now);
            // The registration ack proves liveness; first heartbeat is due one
            // interval from now.
            self.heartbeat.anchor(now);
            self.transition(ConnectionState::Registered, &mut actions);
        } else if self.state == ConnectionState::Registered && self.heartbeat.acknowledge(id) {
            debug!(message_id = %id, "heartbeat acknowledged");
            self.last_seen = Some(now);
        } else {
            actions.push(SessionAction::Notify(SessionEvent::UnmatchedAck {
                message_id: id.clone(),
            }));
        }

        actions
    }

    fn handle_nack(&mut self, id: &MessageId) -> Vec<SessionAction> {
        let mut actions = Vec::new();

        // Any nack rejects the whole session, whatever it correlates with.
        if self.state != ConnectionState::Disconnected {
            actions.push(SessionAction::Notify(SessionEvent::Rejected { message_id: id.clone() }));
            self.transition(ConnectionState::Disconnected, &mut actions);
        }

        actions
    }

    fn gate(&self, message: &Message) -> Option<SessionAction> {
        if self.config.gate_inbound_on_registration && !self.is_registered() {
            Some(SessionAction::Notify(SessionEvent::InboundDropped {
                kind: message.kind,
                message_id: message.message_id.clone(),
                reason: DropReason::NotRegistered,
            }))
        } else {
            None
        }
    }

    fn start_registration(&mut self, now: I, actions: &mut Vec<SessionAction>) {
        let id = self.ids.next_id();
        debug!(message_id = %id, device_id = %self.device_id, "sending register");

        self.pending_register = Some(id.clone());
        self.last_attempt = Some(now);
        self.transition(ConnectionState::Registering, actions);
        actions.push(SessionAction::Send(Message::register(&self.device_id, id)));
    }

    /// Time since the last registration attempt, if the retry interval has
    /// elapsed. Never-attempted counts as elapsed.
    fn retry_elapsed(&self, now: I) -> Option<Duration> {
        match self.last_attempt {
            None => Some(Duration::ZERO),
            Some(at) => {
                let elapsed = now - at;
                (elapsed >= self.config.retry_interval).then_some(elapsed)
            },
        }
    }

    fn transition(&mut self, to: ConnectionState, actions: &mut Vec<SessionAction>) {
        let from = self.state;
        if from == to {
            return;
        }

        if to == ConnectionState::Disconnected {
            self.pending_register = None;
            self.heartbeat.reset();
        }

        self.state = to;
        actions.push(SessionAction::Notify(SessionEvent::StateChanged { from, to }));
    }
}
