//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while framing, decoding or encoding a record.
///
/// Every variant describes a single bad record. None of them affect the
/// stream as a whole: the caller drops the record and continues with the next
/// one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Record exceeds the configured maximum length
    #[error("record too long: {len} bytes exceeds limit of {max}")]
    RecordTooLong {
        /// Length of the offending record in bytes
        len: usize,
        /// Configured limit
        max: usize,
    },

    /// Record contained nothing but whitespace
    #[error("empty record")]
    EmptyRecord,

    /// Record bytes are not valid UTF-8
    #[error("record is not valid UTF-8")]
    InvalidUtf8,

    /// Record is not a well-formed message (bad JSON, unknown type, missing
    /// fields, non-string payload values)
    #[error("malformed record: {0}")]
    Malformed(String),

    /// Message could not be serialized
    #[error("encode failed: {0}")]
    Encode(String),
}
