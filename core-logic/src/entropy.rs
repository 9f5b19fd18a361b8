//! # Entropy
//!
//! Every random decision in the runner (pacing delays, backoff jitter, header
//! telemetry, session refresh coin flips) goes through [`Entropy`], so tests
//! can pin exact timings and header contents.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Source of randomness for pacing, jitter and fingerprint choices.
pub trait Entropy: Send + Sync {
    /// Uniform integer in `0..upper`. Returns 0 when `upper` is 0.
    fn below(&mut self, upper: u64) -> u64;

    /// Uniform float in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform integer in `min..=max`.
    fn between(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + self.below((max - min).saturating_add(1)).min(max - min)
    }

    /// True with the given probability.
    fn chance(&mut self, probability: f64) -> bool {
        self.unit() < probability
    }

    fn pick_index(&mut self, len: usize) -> usize {
        self.below(len as u64) as usize
    }
}

/// OS-seeded generator used by the binary.
#[derive(Debug)]
pub struct SystemEntropy {
    rng: StdRng,
}

impl SystemEntropy {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for SystemEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl Entropy for SystemEntropy {
    fn below(&mut self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        self.rng.gen_range(0..upper)
    }

    fn unit(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}
