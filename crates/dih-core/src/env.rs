//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (time, randomness). The
//! session itself never reads the clock; the host reads it through this trait
//! and passes it into [`crate::Device::poll`]. Simulation swaps in a virtual
//! clock and a seeded RNG.

use std::time::Duration;

/// Source of time and randomness.
///
/// # Invariants
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment {
    /// Monotonic instant type.
    ///
    /// Production uses `std::time::Instant`; simulation uses a virtual clock.
    type Instant: Copy + Ord + std::ops::Sub<Output = Duration>;

    /// Current time (monotonic).
    fn now(&self) -> Self::Instant;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    ///
    /// Used to seed message id generation.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}
