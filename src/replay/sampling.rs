//! Random record sampling.
//!
//! Probabilities are held as 28-bit fixed-point thresholds. A record is kept
//! when a fresh 28-bit random draw falls below the threshold.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed-point precision of sampling probabilities.
pub const SAMPLING_SHIFT: u32 = 28;

/// Threshold that keeps every record.
pub const SAMPLING_ONE: u32 = 1 << SAMPLING_SHIFT;

const SAMPLING_MASK: u32 = SAMPLING_ONE - 1;

/// Convert a probability to a fixed-point threshold, rounding to nearest.
///
/// The result is not clamped; values above [`SAMPLING_ONE`] mean the
/// probability was larger than 1.
pub fn threshold_for(probability: f64) -> u64 {
    if probability.is_nan() || probability <= 0.0 {
        return 0;
    }
    // float-to-int casts saturate
    (probability * SAMPLING_ONE as f64).round() as u64
}

/// Per-session sampling state.
#[derive(Debug)]
pub struct Sampler {
    threshold: u32,
    rng: StdRng,
}

impl Sampler {
    /// Create a sampler. A missing seed draws one from the OS.
    pub fn new(threshold: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            threshold: threshold.min(SAMPLING_ONE),
            rng,
        }
    }

    /// Threshold in fixed point.
    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Probability that a record is kept.
    pub fn probability(&self) -> f64 {
        self.threshold as f64 / SAMPLING_ONE as f64
    }

    /// Whether every record is kept without drawing.
    pub fn keeps_all(&self) -> bool {
        self.threshold >= SAMPLING_ONE
    }

    /// Decide whether to keep the next record.
    pub fn keep(&mut self) -> bool {
        if self.keeps_all() {
            return true;
        }
        (self.rng.gen::<u32>() & SAMPLING_MASK) < self.threshold
    }
}
