//! Standard invariant checks.

use dih_core::ConnectionState;

use super::{Invariant, InvariantResult, SessionSnapshot, Violation};

/// Registration flag agrees with the connection state.
///
/// `is_registered` must be true iff the state is `Registered`; the host reads
/// the flag to decide whether sending data makes sense. Today the flag is
/// derived from the state, so this guards that derivation: snapshots taken
/// with [`SessionSnapshot::of_device`] read both through the host API.
pub struct RegisteredFlagMatchesState;

impl Invariant for RegisteredFlagMatchesState {
    fn name(&self) -> &'static str {
        "registered_flag_matches_state"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let expected = state.state == ConnectionState::Registered;
        if state.is_registered != expected {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "is_registered = {} in state {:?}",
                    state.is_registered, state.state
                ),
            });
        }
        Ok(())
    }
}

/// At most one request awaits an ack, and it is the one the state waits on.
///
/// A Register id may only be pending while `Registering`; a Heartbeat id only
/// while `Registered`.
pub struct AtMostOnePendingRequest;

impl Invariant for AtMostOnePendingRequest {
    fn name(&self) -> &'static str {
        "at_most_one_pending_request"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        let register_ok =
            state.pending_register.is_none() || state.state == ConnectionState::Registering;
        let both = state.pending_register.is_some() && state.pending_heartbeat.is_some();

        if !register_ok || both {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "state {:?} with pending register {:?} and pending heartbeat {:?}",
                    state.state, state.pending_register, state.pending_heartbeat
                ),
            });
        }
        Ok(())
    }
}

/// Heartbeats are only outstanding while registered.
pub struct HeartbeatOnlyWhenRegistered;

impl Invariant for HeartbeatOnlyWhenRegistered {
    fn name(&self) -> &'static str {
        "heartbeat_only_when_registered"
    }

    fn check(&self, state: &SessionSnapshot) -> InvariantResult {
        if state.pending_heartbeat.is_some() && state.state != ConnectionState::Registered {
            return Err(Violation {
                invariant: self.name(),
                message: format!(
                    "heartbeat {:?} outstanding in state {:?}",
                    state.pending_heartbeat, state.state
                ),
            });
        }
        Ok(())
    }
}
