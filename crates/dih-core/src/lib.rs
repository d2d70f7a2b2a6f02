//! Device session core.
//!
//! Sans-IO implementation of the device side of the Device Interaction Hub
//! protocol: registration with retry, heartbeat supervision, and dispatch of
//! inbound data and commands.
//!
//! # Architecture
//!
//! - [`Session`]: pure state machine. Methods take the current time and
//!   return [`SessionAction`]s; no I/O, no clock access.
//! - [`HeartbeatSupervisor`]: liveness probing while registered.
//! - [`Device`]: the host-facing poll driver. Owns a [`Transport`], decodes
//!   inbound lines, feeds them to the session, and executes the resulting
//!   actions.
//!
//! All work happens inside [`Device::poll`]; the host calls it from its main
//! loop, much more often than any configured interval.

#![forbid(unsafe_code)]

pub mod config;
pub mod device;
pub mod env;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod message_id;
pub mod session;
pub mod transport;

pub use config::SessionConfig;
pub use device::{Device, EventSink, PayloadSink};
pub use env::Environment;
pub use error::{ConfigError, SessionError, TransportError};
pub use event::{DropReason, SendFailure, SessionEvent};
pub use heartbeat::{HeartbeatOutcome, HeartbeatSupervisor};
pub use message_id::MessageIdGenerator;
pub use session::{ConnectionState, Session, SessionAction};
pub use transport::Transport;
