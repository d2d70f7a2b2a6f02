//! In-memory line transport.
//!
//! `SimTransport` is a shared handle: the [`dih_core::Device`] owns one clone,
//! the test (or [`crate::SimHub`]) keeps another to inject inbound records and
//! collect outbound ones. Inbound bytes may also be fed raw, in which case they
//! go through a [`LineFramer`] exactly as a real serial stream would.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use dih_core::{Transport, TransportError};
use dih_proto::{DEFAULT_MAX_RECORD_LEN, LineFramer, ProtocolError};

#[derive(Debug)]
struct Link {
    framer: LineFramer,
    to_device: VecDeque<Result<String, ProtocolError>>,
    from_device: VecDeque<String>,
    closed: bool,
}

/// Shared in-memory transport between a device and a simulated hub.
#[derive(Debug, Clone)]
pub struct SimTransport {
    link: Rc<RefCell<Link>>,
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RECORD_LEN)
    }
}

impl SimTransport {
    /// Transport whose raw-byte path rejects records longer than `max_len`.
    pub fn new(max_len: usize) -> Self {
        Self {
            link: Rc::new(RefCell::new(Link {
                framer: LineFramer::new(max_len),
                to_device: VecDeque::new(),
                from_device: VecDeque::new(),
                closed: false,
            })),
        }
    }

    /// Queue one complete record for the device.
    pub fn inject_line(&self, line: impl Into<String>) {
        self.link.borrow_mut().to_device.push_back(Ok(line.into()));
    }

    /// Queue raw bytes for the device; complete lines become records.
    pub fn inject_bytes(&self, bytes: &[u8]) {
        let mut link = self.link.borrow_mut();
        let records = link.framer.push(bytes);
        link.to_device.extend(records);
    }

    /// Take every record the device has written so far.
    pub fn take_sent(&self) -> Vec<String> {
        self.link.borrow_mut().from_device.drain(..).collect()
    }

    /// Number of records waiting for the device.
    pub fn pending_inbound(&self) -> usize {
        self.link.borrow().to_device.len()
    }

    /// Make every subsequent write fail.
    pub fn close(&self) {
        self.link.borrow_mut().closed = true;
    }
}

impl Transport for SimTransport {
    fn available(&self) -> bool {
        !self.link.borrow().to_device.is_empty()
    }

    fn read_line(&mut self) -> Result<Option<String>, TransportError> {
        match self.link.borrow_mut().to_device.pop_front() {
            None => Ok(None),
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(err)) => Err(TransportError::Framing(err)),
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), TransportError> {
        let mut link = self.link.borrow_mut();
        if link.closed {
            return Err(TransportError::Closed);
        }
        link.from_device.push_back(line.to_owned());
        Ok(())
    }
}
