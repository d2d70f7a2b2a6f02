//! Observable session events.
//!
//! Events carry every fault the protocol tolerates: malformed input, unmatched
//! acknowledgements, rejections and timeouts. None of them are fatal; they
//! are reported so the host can log or count them.

use std::time::Duration;

use dih_proto::{MessageId, MessageKind, ProtocolError};

use crate::{error::TransportError, session::ConnectionState};

/// Why an inbound message was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Inbound gating is enabled and the session is not registered
    NotRegistered,
    /// Message kind is only meaningful hub-bound
    UnexpectedKind,
}

/// Something the host may want to observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Connection state changed
    StateChanged {
        /// Previous state
        from: ConnectionState,
        /// New state
        to: ConnectionState,
    },

    /// Inbound record could not be decoded and was dropped
    DecodeFailed(ProtocolError),

    /// Ack matched neither the pending registration nor the pending heartbeat
    UnmatchedAck {
        /// Correlation id carried by the ack
        message_id: MessageId,
    },

    /// Hub rejected the session
    Rejected {
        /// Correlation id carried by the nack
        message_id: MessageId,
    },

    /// No registration ack within the retry interval
    RegistrationTimedOut {
        /// Time since the registration request
        elapsed: Duration,
    },

    /// No heartbeat ack within the ack timeout
    PeerLost {
        /// Time since the heartbeat was sent
        elapsed: Duration,
    },

    /// Inbound message was not dispatched
    InboundDropped {
        /// Kind of the dropped message
        kind: MessageKind,
        /// Its correlation id
        message_id: MessageId,
        /// Why it was dropped
        reason: DropReason,
    },

    /// Outbound message could not be encoded or written
    SendFailed {
        /// Kind of the message that was lost
        kind: MessageKind,
        /// Encoding or transport failure
        error: SendFailure,
    },
}

/// Cause of a [`SessionEvent::SendFailed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendFailure {
    /// Message could not be encoded
    Encode(ProtocolError),
    /// Transport refused the record
    Transport(TransportError),
}

impl std::fmt::Display for SendFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "{err}"),
            Self::Transport(err) => write!(f, "{err}"),
        }
    }
}

impl SessionEvent {
    /// Returns true if this event reports a tolerated fault rather than
    /// normal progress.
    pub fn is_fault(&self) -> bool {
        !matches!(self, Self::StateChanged { .. })
    }
}
