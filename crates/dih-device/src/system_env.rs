//! Production environment using the system clock and OS randomness.
//!
//! Time comes from `std::time::Instant`, so it is monotonic but not
//! reproducible. Randomness is only used to seed the message id nonce.

use dih_core::Environment;

/// Production environment using system time and OS RNG.
///
/// # Panics
///
/// `random_bytes` panics if the OS RNG fails. A device that cannot draw a
/// nonce would reuse message ids across restarts, so there is nothing useful
/// to fall back to.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = std::time::Instant;

    #[allow(clippy::disallowed_methods)]
    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    #[allow(clippy::disallowed_methods)]
    fn time_advances() {
        let env = SystemEnv::new();

        let t1 = env.now();
        std::thread::sleep(Duration::from_millis(5));
        let t2 = env.now();

        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(5));
    }

    #[test]
    fn nonces_differ() {
        let env = SystemEnv::new();

        let mut a = [0u8; 16];
        let mut b = [0u8; 16];
        env.random_bytes(&mut a);
        env.random_bytes(&mut b);

        assert_ne!(a, b);
    }
}
