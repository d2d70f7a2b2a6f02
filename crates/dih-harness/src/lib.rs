//! Deterministic simulation harness for device session testing.
//!
//! Virtual-time implementations of the Environment and Transport traits, plus
//! a scripted hub, for reproducible tests of registration, heartbeat and
//! dispatch behaviour without sockets or wall-clock sleeps.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after every step
//! regardless of the event sequence. Use [`InvariantRegistry::standard()`] for
//! the session invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod invariants;
pub mod sim_env;
pub mod sim_hub;
pub mod sim_transport;

pub use invariants::{
    AtMostOnePendingRequest, HeartbeatOnlyWhenRegistered, Invariant, InvariantRegistry,
    InvariantResult, RegisteredFlagMatchesState, SessionSnapshot, Violation,
};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_hub::{HubPolicy, SimHub};
pub use sim_transport::SimTransport;
