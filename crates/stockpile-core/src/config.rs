use crate::fixed::{Cycles, Fixed64, clamp_probability};
use serde::{Deserialize, Serialize};

/// Seed used when no explicit seed is configured.
pub const DEFAULT_RNG_SEED: u64 = 0x5EED_CAFE;

/// Tunables of the crafting task scheduler.
///
/// Missing fields in a serialized config take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tasks are updated on cycles divisible by this interval.
    pub update_interval: Cycles,
    /// Missing-input sets are eligible for clearing on cycles divisible by
    /// this interval. Retries are only checked on update cycles, so
    /// [`normalized`](Self::normalized) rounds it up to a multiple of
    /// `update_interval`.
    pub retry_interval: Cycles,
    /// Probability that an eligible missing set is cleared.
    pub retry_probability: Fixed64,
    pub rng_seed: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval: 5,
            retry_interval: 100,
            retry_probability: Fixed64::from_num(0.5),
            rng_seed: DEFAULT_RNG_SEED,
        }
    }
}

impl SchedulerConfig {
    /// Copy with zero intervals raised to one, the retry interval rounded up
    /// to a multiple of the update interval, and the probability clamped
    /// into `[0, 1]`.
    pub fn normalized(&self) -> Self {
        let update_interval = self.update_interval.max(1);
        let retry_interval = self
            .retry_interval
            .max(1)
            .div_ceil(update_interval)
            .saturating_mul(update_interval);
        Self {
            update_interval,
            retry_interval,
            retry_probability: clamp_probability(self.retry_probability),
            rng_seed: self.rng_seed,
        }
    }

    pub fn is_update_cycle(&self, cycle: Cycles) -> bool {
        cycle % self.update_interval.max(1) == 0
    }

    pub fn is_retry_cycle(&self, cycle: Cycles) -> bool {
        cycle % self.retry_interval.max(1) == 0
    }
}
