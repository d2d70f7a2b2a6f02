//! JSON line codec.
//!
//! One message per record, no embedded newlines. The record terminator itself
//! belongs to the transport and is neither produced nor required here, but a
//! trailing `\r` or `\n` is tolerated on decode because serial peers commonly
//! send CRLF.

use crate::{
    Message,
    errors::{ProtocolError, Result},
};

/// Default upper bound on a single record, in bytes.
///
/// Sized for a small microcontroller peer: a register or heartbeat is well
/// under 100 bytes, leaving room for a handful of payload entries.
pub const DEFAULT_MAX_RECORD_LEN: usize = 256;

/// Serialize `message` into a single record.
///
/// # Errors
///
/// - `ProtocolError::RecordTooLong` if the encoded record exceeds `max_len`
/// - `ProtocolError::Encode` if serialization fails
pub fn encode_line(message: &Message, max_len: usize) -> Result<String> {
    let record =
        serde_json::to_string(message).map_err(|e| ProtocolError::Encode(e.to_string()))?;

    if record.len() > max_len {
        return Err(ProtocolError::RecordTooLong { len: record.len(), max: max_len });
    }

    Ok(record)
}

/// Parse a single record into a [`Message`].
///
/// # Errors
///
/// - `ProtocolError::RecordTooLong` if the record exceeds `max_len`
/// - `ProtocolError::EmptyRecord` if the record is blank
/// - `ProtocolError::Malformed` for anything that is not a well-formed message
pub fn decode_line(line: &str, max_len: usize) -> Result<Message> {
    let record = line.trim_end_matches(['\r', '\n']);

    if record.len() > max_len {
        return Err(ProtocolError::RecordTooLong { len: record.len(), max: max_len });
    }

    if record.trim().is_empty() {
        return Err(ProtocolError::EmptyRecord);
    }

    serde_json::from_str(record).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
