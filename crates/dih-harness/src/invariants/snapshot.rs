//! Observable session state.

use std::{ops::Sub, time::Duration};

use dih_core::{ConnectionState, Device, Session, Transport};
use dih_proto::MessageId;

/// Snapshot of the state the invariants reason about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Connection state
    pub state: ConnectionState,
    /// Registration flag as reported to the host
    pub is_registered: bool,
    /// Outstanding Register id
    pub pending_register: Option<MessageId>,
    /// Outstanding Heartbeat id
    pub pending_heartbeat: Option<MessageId>,
}

impl SessionSnapshot {
    /// Capture the observable state of `session`.
    pub fn of<I>(session: &Session<I>) -> Self
    where
        I: Copy + Ord + Sub<Output = Duration>,
    {
        Self {
            state: session.state(),
            is_registered: session.is_registered(),
            pending_register: session.pending_register_id().cloned(),
            pending_heartbeat: session.pending_heartbeat_id().cloned(),
        }
    }

    /// Capture what the host sees through `device`.
    ///
    /// The state and registration flag come from the device's own accessors,
    /// so a flag that drifts from the state it is derived from shows up here.
    pub fn of_device<T, I>(device: &Device<T, I>) -> Self
    where
        T: Transport,
        I: Copy + Ord + Sub<Output = Duration>,
    {
        Self {
            state: device.current_state(),
            is_registered: device.is_registered(),
            ..Self::of(device.session())
        }
    }

    /// State of a freshly created session.
    pub fn initial() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            is_registered: false,
            pending_register: None,
            pending_heartbeat: None,
        }
    }
}
