//! Error types for the device session core.
//!
//! Faults on the wire (bad records, unmatched acks, rejections, timeouts) are
//! not errors at this level: they become state transitions and
//! [`crate::SessionEvent`]s. The types here cover misuse of the host API,
//! invalid configuration and transport failures.

use std::io;

use dih_proto::ProtocolError;
use thiserror::Error;

use crate::session::ConnectionState;

/// Errors returned by session operations requested by the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation requires a registered session
    #[error("not registered (state {state:?})")]
    NotRegistered {
        /// State when the operation was attempted
        state: ConnectionState,
    },

    /// Registration requested while already registered
    #[error("already registered")]
    AlreadyRegistered,
}

/// Invalid [`crate::SessionConfig`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An interval or timeout is zero
    #[error("{field} must be non-zero")]
    ZeroDuration {
        /// Name of the offending field
        field: &'static str,
    },

    /// Record limit cannot fit a minimal message
    #[error("max record length {len} is below minimum {min}")]
    RecordLimitTooSmall {
        /// Configured limit
        len: usize,
        /// Smallest accepted limit
        min: usize,
    },

    /// Record limit exceeds what a device should buffer
    #[error("max record length {len} is above maximum {max}")]
    RecordLimitTooLarge {
        /// Configured limit
        len: usize,
        /// Largest accepted limit
        max: usize,
    },
}

/// Errors reported by a [`crate::Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Underlying stream is closed
    #[error("transport closed")]
    Closed,

    /// Underlying stream cannot accept more data right now
    #[error("transport full")]
    Full,

    /// A record was dropped while framing (too long, not UTF-8)
    #[error("framing error: {0}")]
    Framing(#[from] ProtocolError),

    /// I/O failure
    #[error("transport error: {0}")]
    Io(String),
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
