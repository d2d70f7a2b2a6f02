//! Device Interaction Hub wire protocol.
//!
//! Devices and hubs exchange one JSON object per line over a byte stream.
//! This crate defines the message types, the line codec, and a bounded line
//! framer. It performs no I/O and holds no session state; see `dih-core` for
//! the state machine that drives these messages.
//!
//! # Wire Format
//!
//! ```text
//! {"type":"data","device_id":"dev-1","message_id":"1a2b3c4d-7","payload":{"temperature":"23.5"}}
//! ```
//!
//! `payload` is only present for `data` and `command` messages.

#![forbid(unsafe_code)]

pub mod codec;
pub mod errors;
pub mod framing;
pub mod message;

pub use codec::{DEFAULT_MAX_RECORD_LEN, decode_line, encode_line};
pub use errors::{ProtocolError, Result};
pub use framing::LineFramer;
pub use message::{Message, MessageId, MessageKind, Payload};
