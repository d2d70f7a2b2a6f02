//! Heartbeat supervision.
//!
//! While registered, the device sends a heartbeat every `interval` and expects an
//! ack within `ack_timeout`. At most one heartbeat is outstanding; no new one is
//! sent while one awaits its ack. A missed deadline is the only way a healthy
//! session degrades without an explicit rejection.

use std::{
    ops::Sub,
    time::{Duration, Instant},
};

use dih_proto::MessageId;

/// Result of polling the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// Nothing to do this tick
    Idle,
    /// A heartbeat is due; the caller sends it and calls
    /// [`HeartbeatSupervisor::record_sent`]
    Due,
    /// Outstanding heartbeat was not acknowledged in time. The supervisor has
    /// already cleared the pending heartbeat.
    PeerLost {
        /// Time since the heartbeat was sent
        elapsed: Duration,
    },
}

/// Heartbeat timer and correlation state.
#[derive(Debug, Clone)]
pub struct HeartbeatSupervisor<I = Instant>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    interval: Duration,
    ack_timeout: Duration,
    /// When the last heartbeat was sent, or the schedule was anchored
    last_sent: Option<I>,
    /// Id of the outstanding heartbeat. `Some` means awaiting an ack.
    pending: Option<MessageId>,
}

impl<I> HeartbeatSupervisor<I>
where
    I: Copy + Ord + Sub<Output = Duration>,
{
    /// Create an idle supervisor.
    pub fn new(interval: Duration, ack_timeout: Duration) -> Self {
        Self { interval, ack_timeout, last_sent: None, pending: None }
    }

    /// Returns true while a heartbeat awaits its ack.
    pub fn is_awaiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Id of the outstanding heartbeat.
    pub fn pending_id(&self) -> Option<&MessageId> {
        self.pending.as_ref()
    }

    /// When the last heartbeat was sent (or the schedule anchored).
    pub fn last_sent(&self) -> Option<I> {
        self.last_sent
    }

    /// Evaluate timers.
    pub fn poll(&mut self, now: I) -> HeartbeatOutcome {
        if self.pending.is_some() {
            let elapsed = self.last_sent.map_or(Duration::ZERO, |sent| now - sent);
            if elapsed >= self.ack_timeout {
                self.pending = None;
                return HeartbeatOutcome::PeerLost { elapsed };
            }
            return HeartbeatOutcome::Idle;
        }

        let due = match self.last_sent {
            None => true,
            Some(sent) => now - sent >= self.interval,
        };

        if due { HeartbeatOutcome::Due } else { HeartbeatOutcome::Idle }
    }

    /// Record that a heartbeat with `id` was sent at `now`.
    pub fn record_sent(&mut self, id: MessageId, now: I) {
        debug_assert!(self.pending.is_none(), "heartbeat sent while another is outstanding");
        self.pending = Some(id);
        self.last_sent = Some(now);
    }

    /// Clear the outstanding heartbeat if `id` matches it.
    ///
    /// Returns false for any other id, including late acks for heartbeats that
    /// already timed out.
    pub fn acknowledge(&mut self, id: &MessageId) -> bool {
        if self.pending.as_ref() == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Restart the schedule at `now` with nothing outstanding.
    ///
    /// The next heartbeat is due one interval later.
    pub fn anchor(&mut self, now: I) {
        self.pending = None;
        self.last_sent = Some(now);
    }

    /// Forget all timer and correlation state.
    pub fn reset(&mut self) {
        self.pending = None;
        self.last_sent = None;
    }
}
