//! Bounded line framing.
//!
//! Splits a raw byte stream into `\n`-terminated records. Memory use is capped
//! at the configured record limit: once a record grows past it, the framer
//! stops buffering and only counts bytes until the next newline, then reports
//! a single [`ProtocolError::RecordTooLong`] for the whole record.
//!
//! # Invariants
//!
//! - The internal buffer never holds more than `max_len + 1` bytes (the extra
//!   byte is room for the `\r` of a CRLF terminator).
//! - Each terminated record produces exactly one item, `Ok` or `Err`.

use bytes::BytesMut;

use crate::errors::{ProtocolError, Result};

/// Upper bound on the buffer allocated up front; larger limits grow on demand.
const INITIAL_CAPACITY: usize = 1024;

/// Oversized record being skipped up to its newline.
#[derive(Debug, Clone, Copy)]
struct Discard {
    /// Bytes seen so far, `\n` excluded
    len: usize,
    /// Last byte seen was `\r`
    trailing_cr: bool,
}

/// Incremental splitter for newline-delimited records.
#[derive(Debug, Clone)]
pub struct LineFramer {
    /// Bytes of the current, unterminated record
    buf: BytesMut,
    /// Maximum record length, terminator excluded
    max_len: usize,
    /// Oversized record being discarded. `None` when buffering normally.
    discarding: Option<Discard>,
}

impl LineFramer {
    /// Create a framer that rejects records longer than `max_len` bytes.
    pub fn new(max_len: usize) -> Self {
        let capacity = max_len.saturating_add(1).min(INITIAL_CAPACITY);
        Self { buf: BytesMut::with_capacity(capacity), max_len, discarding: None }
    }

    /// Configured record limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    /// Bytes currently buffered for the unterminated record.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Feed `data` and return every record it completes, in order.
    pub fn push(&mut self, data: &[u8]) -> Vec<Result<String>> {
        let mut records = Vec::new();
        let mut rest = data;

        while !rest.is_empty() {
            let (chunk, terminated) = match rest.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    let chunk = &rest[..pos];
                    rest = &rest[pos + 1..];
                    (chunk, true)
                },
                None => {
                    let chunk = rest;
                    rest = &[];
                    (chunk, false)
                },
            };

            self.append(chunk);

            if terminated {
                records.push(self.finish_record());
            }
        }

        records
    }

    fn append(&mut self, chunk: &[u8]) {
        if let Some(discard) = self.discarding.as_mut() {
            discard.len = discard.len.saturating_add(chunk.len());
            if let Some(&last) = chunk.last() {
                discard.trailing_cr = last == b'\r';
            }
            return;
        }

        if self.buf.len() + chunk.len() > self.max_len.saturating_add(1) {
            self.discarding = Some(Discard {
                len: self.buf.len() + chunk.len(),
                trailing_cr: chunk.last() == Some(&b'\r'),
            });
            self.buf.clear();
            return;
        }

        self.buf.extend_from_slice(chunk);
    }

    fn finish_record(&mut self) -> Result<String> {
        if let Some(discard) = self.discarding.take() {
            // Same length decode_line reports: CR of a CRLF terminator excluded
            let len = discard.len - usize::from(discard.trailing_cr);
            return Err(ProtocolError::RecordTooLong { len, max: self.max_len });
        }

        let mut record = self.buf.split();
        if record.last() == Some(&b'\r') {
            record.truncate(record.len() - 1);
        }

        if record.len() > self.max_len {
            return Err(ProtocolError::RecordTooLong { len: record.len(), max: self.max_len });
        }

        String::from_utf8(record.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }
}
