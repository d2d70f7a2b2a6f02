//! Correlation id generation.
//!
//! Ids are `<nonce>-<counter>`: a random 32-bit boot nonce in hex followed by
//! a monotonically increasing counter. The counter guarantees uniqueness
//! within a boot regardless of clock resolution; the nonce keeps a rebooted
//! device from reusing ids the hub may still remember.

use dih_proto::MessageId;

use crate::env::Environment;

/// Generator of unique [`MessageId`]s.
#[derive(Debug, Clone)]
pub struct MessageIdGenerator {
    nonce: u32,
    next: u64,
}

impl MessageIdGenerator {
    /// Generator with a fixed nonce. Counter starts at 1.
    pub fn new(nonce: u32) -> Self {
        Self { nonce, next: 1 }
    }

    /// Generator seeded from the environment's RNG.
    pub fn from_env<E: Environment>(env: &E) -> Self {
        Self::new((env.random_u64() >> 32) as u32)
    }

    /// Produce the next id.
    pub fn next_id(&mut self) -> MessageId {
        let id = MessageId::new(format!("{:08x}-{}", self.nonce, self.next));
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ids_are_unique_and_prefixed() {
        let mut ids = MessageIdGenerator::new(0xdead_beef);

        let generated: HashSet<_> = (0..1000).map(|_| ids.next_id()).collect();
        assert_eq!(generated.len(), 1000);
        assert!(generated.iter().all(|id| id.as_str().starts_with("deadbeef-")));
    }

    #[test]
    fn counter_starts_at_one() {
        let mut ids = MessageIdGenerator::new(1);
        assert_eq!(ids.next_id().as_str(), "00000001-1");
        assert_eq!(ids.next_id().as_str(), "00000001-2");
    }
}
