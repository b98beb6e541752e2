//! Seeded PRNG behind the scheduler's randomized decisions.
//!
//! SplitMix64: 8 bytes of state, platform independent, serializable, so a
//! scheduler run replays exactly from its seed.

use crate::fixed::Fixed64;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Returns `true` with probability `p`. Values at or below zero never
    /// hit; values at or above one always hit.
    pub fn chance(&mut self, p: Fixed64) -> bool {
        if p <= Fixed64::ZERO {
            return false;
        }
        if p >= Fixed64::ONE {
            return true;
        }
        // For p in (0, 1) the Q32.32 bits are the fraction scaled to 2^32.
        let roll = self.next_u64() >> 32;
        roll < p.to_bits() as u64
    }

    pub fn state(&self) -> u64 {
        self.state
    }
}
