//! Host-facing poll driver.
//!
//! [`Device`] glues a [`Session`] to a [`Transport`] and the host's callbacks.
//! The host calls [`Device::poll`] from its main loop; each call:
//!
//! 1. drains every inbound record currently buffered by the transport,
//! 2. decodes and dispatches each one (malformed records are dropped),
//! 3. evaluates the session timers, emitting at most one Register or
//!    Heartbeat.
//!
//! Callbacks run synchronously inside `poll` and must not block. `poll` must
//! not be called re-entrantly from a callback; the `&mut self` receiver
//! enforces this.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use dih_proto::{Message, Payload, decode_line, encode_line};
use tracing::{debug, info, warn};

use crate::{
    config::SessionConfig,
    env::Environment,
    error::{ConfigError, TransportError},
    event::{SendFailure, SessionEvent},
    message_id::MessageIdGenerator,
    session::{ConnectionState, Session, SessionAction},
    transport::Transport,
};

/// Callback receiving inbound data or command payloads.
pub type PayloadSink = Box<dyn FnMut(&Payload)>;

/// Callback receiving session events.
pub type EventSink = Box<dyn FnMut(&SessionEvent)>;

/// Device endpoint: session state, transport, and host callbacks.
pub struct Device<T, I = Instant>
where
    T: Transport,
    I: Copy + Ord + Sub<Output = Duration>,
{
    session: Session<I>,
    transport: T,
    on_data: Option<PayloadSink>,
    on_command: Option<PayloadSink>,
    on_event: Option<EventSink>,
}

impl<T, I> Device<T, I>
where
    T: Transport,
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create a device with no identity yet.
    ///
    /// Call [`Device::configure`] before the first [`Device::poll`].
    ///
    /// # Errors
    ///
    /// - `ConfigError` if `config` fails [`SessionConfig::validate`]
    pub fn new<E>(env: &E, transport: T, config: SessionConfig) -> Result<Self, ConfigError>
    where
        E: Environment<Instant = I>,
    {
        config.validate()?;
        let ids = MessageIdGenerator::from_env(env);

        Ok(Self {
            session: Session::new(String::new(), config, ids),
            transport,
            on_data: None,
            on_command: None,
            on_event: None,
        })
    }

    /// Set the device identity.
    ///
    /// Must be non-empty before the first registration; this is not checked.
    pub fn configure(&mut self, device_id: impl Into<String>) {
        self.session.set_device_id(device_id);
    }

    /// Register the callback for inbound data.
    pub fn on_data(&mut self, sink: impl FnMut(&Payload) + 'static) {
        self.on_data = Some(Box::new(sink));
    }

    /// Register the callback for inbound commands.
    pub fn on_command(&mut self, sink: impl FnMut(&Payload) + 'static) {
        self.on_command = Some(Box::new(sink));
    }

    /// Register the callback for session events.
    pub fn on_event(&mut self, sink: impl FnMut(&SessionEvent) + 'static) {
        self.on_event = Some(Box::new(sink));
    }

    /// True iff registered with the hub.
    pub fn is_registered(&self) -> bool {
        self.session.is_registered()
    }

    /// Current connection state.
    pub fn current_state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Underlying session, for inspection.
    pub fn session(&self) -> &Session<I> {
        &self.session
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Run one tick: drain inbound records, then evaluate timers.
    pub fn poll(&mut self, now: I) {
        self.drain_inbound(now);

        let actions = self.session.tick(now);
        self.execute(actions);
    }

    /// Register now instead of waiting for the retry timer.
    ///
    /// Returns false (and sends nothing) if already registered.
    pub fn request_register(&mut self, now: I) -> bool {
        match self.session.register(now) {
            Ok(actions) => {
                self.execute(actions);
                true
            },
            Err(err) => {
                debug!(%err, "register request ignored");
                false
            },
        }
    }

    /// Send a Deregister and stop registering until
    /// [`Device::request_register`].
    pub fn request_deregister(&mut self) {
        let actions = self.session.deregister();
        self.execute(actions);
    }

    /// Send a single key/value reading.
    ///
    /// Returns true only if the record was written to the transport. False
    /// (and nothing written) unless registered; false with a
    /// [`SessionEvent::SendFailed`] if encoding or the write failed.
    pub fn send_data(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        match self.session.send_data(key, value) {
            Ok(actions) => self.execute(actions),
            Err(_) => false,
        }
    }

    /// Send a multi-entry payload.
    ///
    /// Same result contract as [`Device::send_data`].
    pub fn send_payload(&mut self, payload: Payload) -> bool {
        match self.session.send_payload(payload) {
            Ok(actions) => self.execute(actions),
            Err(_) => false,
        }
    }

    fn drain_inbound(&mut self, now: I) {
        let max_len = self.session.config().max_record_len;

        while self.transport.available() {
            let line = match self.transport.read_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(TransportError::Framing(err)) => {
                    self.notify(SessionEvent::DecodeFailed(err));
                    continue;
                },
                Err(err) => {
                    warn!(%err, "transport read failed");
                    break;
                },
            };

            match decode_line(&line, max_len) {
                Ok(message) => {
                    debug!(kind = %message.kind, message_id = %message.message_id, "received");
                    let actions = self.session.handle_message(&message, now);
                    self.execute(actions);
                },
                Err(err) => self.notify(SessionEvent::DecodeFailed(err)),
            }
        }
    }

    /// Run `actions` in order. Returns false if any `Send` failed.
    fn execute(&mut self, actions: Vec<SessionAction>) -> bool {
        let mut all_sent = true;

        for action in actions {
            match action {
                SessionAction::Send(message) => all_sent &= self.send(&message),
                SessionAction::DeliverData(payload) => {
                    if let Some(sink) = self.on_data.as_mut() {
                        sink(&payload);
                    }
                },
                SessionAction::DeliverCommand(payload) => {
                    if let Some(sink) = self.on_command.as_mut() {
                        sink(&payload);
                    }
                },
                SessionAction::Notify(event) => self.notify(event),
            }
        }

        all_sent
    }

    fn send(&mut self, message: &Message) -> bool {
        let max_len = self.session.config().max_record_len;

        let failure = match encode_line(message, max_len) {
            Ok(line) => match self.transport.write_line(&line) {
                Ok(()) => {
                    debug!(kind = %message.kind, message_id = %message.message_id, "sent");
                    return true;
                },
                Err(err) => SendFailure::Transport(err),
            },
            Err(err) => SendFailure::Encode(err),
        };

        self.notify(SessionEvent::SendFailed { kind: message.kind, error: failure });
        false
    }

    fn notify(&mut self, event: SessionEvent) {
        match &event {
            SessionEvent::StateChanged { from, to } => {
                info!(?from, ?to, device_id = %self.session.device_id(), "session state changed");
            },
            SessionEvent::UnmatchedAck { message_id } => {
                debug!(%message_id, "ignoring unmatched ack");
            },
            SessionEvent::DecodeFailed(err) => warn!(%err, "dropping malformed record"),
            SessionEvent::Rejected { message_id } => warn!(%message_id, "hub rejected session"),
            SessionEvent::RegistrationTimedOut { elapsed } => {
                warn!(?elapsed, "registration not acknowledged");
            },
            SessionEvent::PeerLost { elapsed } => warn!(?elapsed, "heartbeat not acknowledged"),
            SessionEvent::InboundDropped { kind, message_id, reason } => {
                debug!(%kind, %message_id, ?reason, "inbound message dropped");
            },
            SessionEvent::SendFailed { kind, error } => warn!(%kind, %error, "send failed"),
        }

        if let Some(sink) = self.on_event.as_mut() {
            sink(&event);
        }
    }
}
