//! Invariant checking for deterministic simulation testing.
//!
//! Invariants are properties that must always hold during execution. Unlike
//! example-based tests that check specific scenarios, invariants verify
//! behavioural properties across all possible event sequences.
//!
//! # Architecture
//!
//! Observable session state is extracted into a [`SessionSnapshot`], then
//! every registered [`Invariant`] runs against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! let snapshot = SessionSnapshot::of(device.session());
//! registry.assert_all(&snapshot, "after poll");
//! ```

mod checks;
mod snapshot;

pub use checks::{AtMostOnePendingRequest, HeartbeatOnlyWhenRegistered, RegisteredFlagMatchesState};
pub use snapshot::SessionSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against session state.
pub trait Invariant {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against the current state.
    fn check(&self, state: &SessionSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Create a registry with the standard session invariants.
    ///
    /// Includes:
    /// - [`RegisteredFlagMatchesState`]
    /// - [`AtMostOnePendingRequest`]
    /// - [`HeartbeatOnlyWhenRegistered`]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(RegisteredFlagMatchesState);
        registry.add(AtMostOnePendingRequest);
        registry.add(HeartbeatOnlyWhenRegistered);
        registry
    }

    /// Add an invariant to the registry.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check all invariants against the given state.
    ///
    /// Returns `Ok(())` if all invariants hold, or all violations found.
    pub fn check_all(&self, state: &SessionSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Check all invariants, panicking on the first failure.
    ///
    /// Use this in tests where you want immediate failure with context.
    #[allow(clippy::panic)]
    pub fn assert_all(&self, state: &SessionSnapshot, context: &str) {
        if let Err(violations) = self.check_all(state) {
            let messages: Vec<_> = violations.iter().map(ToString::to_string).collect();
            panic!("Invariant violation {context}:\n  {}", messages.join("\n  "));
        }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use dih_core::ConnectionState;
    use dih_proto::MessageId;

    use super::*;

    #[test]
    fn standard_registry_has_invariants() {
        let registry = InvariantRegistry::standard();
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn initial_snapshot_passes() {
        let registry = InvariantRegistry::standard();
        assert!(registry.check_all(&SessionSnapshot::initial()).is_ok());
    }

    #[test]
    fn registered_flag_drift_is_reported() {
        let snapshot = SessionSnapshot {
            state: ConnectionState::Registered,
            is_registered: false,
            pending_register: None,
            pending_heartbeat: None,
        };

        let violations = InvariantRegistry::standard().check_all(&snapshot).unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].invariant, "registered_flag_matches_state");
    }

    #[test]
    fn inconsistent_snapshot_reports_every_violation() {
        let registry = InvariantRegistry::standard();
        let snapshot = SessionSnapshot {
            state: ConnectionState::Disconnected,
            is_registered: true,
            pending_register: Some(MessageId::from("r")),
            pending_heartbeat: Some(MessageId::from("h")),
        };

        let violations = registry.check_all(&snapshot).unwrap_err();
        assert_eq!(violations.len(), 3);
    }
}
