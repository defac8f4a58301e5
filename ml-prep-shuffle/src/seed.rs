//! Deterministic random number generation

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A seed for deterministic random number generation
///
/// The same seed always yields the same permutations and samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Seed(u64);

impl Seed {
    /// Create a new seed with the given value
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Draw a fresh seed from operating system entropy
    #[must_use]
    pub fn from_entropy() -> Self {
        use rand::RngCore;
        Self(ChaCha8Rng::from_entropy().next_u64())
    }

    /// Use the given seed, or draw one from entropy
    #[must_use]
    pub fn or_entropy(value: Option<u64>) -> Self {
        value.map_or_else(Self::from_entropy, Self::new)
    }

    /// Get the underlying seed value
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Create a new random number generator from this seed
    #[must_use]
    pub fn to_rng(&self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }

    /// Derive an independent seed for a named stream
    #[must_use]
    pub fn derive(&self, key: &str) -> Self {
        // FNV-1a so derived seeds are stable across releases
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325 ^ self.0;
        for byte in key.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Self(hash)
    }
}

impl From<u64> for Seed {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl From<Seed> for u64 {
    fn from(seed: Seed) -> Self {
        seed.0
    }
}
