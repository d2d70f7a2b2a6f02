//! Line transport abstraction.
//!
//! The session speaks in whole records. Framing bytes into lines (and bounding
//! their length) is the transport's job; [`dih_proto::LineFramer`] is the
//! usual building block.

use crate::error::TransportError;

/// Bidirectional line-oriented byte stream.
///
/// Implementations must not block: `read_line` returns whatever is already
/// buffered, and `write_line` either queues the record or fails.
pub trait Transport {
    /// Returns true if at least one inbound record may be read.
    fn available(&self) -> bool;

    /// Read one record without its terminator. `Ok(None)` if nothing is
    /// buffered.
    fn read_line(&mut self) -> Result<Option<String>, TransportError>;

    /// Write one record. The transport appends the line terminator.
    fn write_line(&mut self, line: &str) -> Result<(), TransportError>;
}
