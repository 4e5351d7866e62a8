//! Single-parameter logistic response model with fixed difficulty buckets.
//!
//! Difficulty levels are not calibrated from data; each level maps to a
//! constant challenge value on the theta scale.

use super::types::{MAX_DIFFICULTY, MIN_DIFFICULTY};

const CHALLENGE_BY_LEVEL: [f64; 4] = [-1.0, -0.3, 0.4, 1.0];

pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Challenge constant for a difficulty level. Out-of-range levels are
/// clamped to the nearest bucket.
pub fn challenge(level: u8) -> f64 {
    let level = level.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY);
    CHALLENGE_BY_LEVEL[(level - MIN_DIFFICULTY) as usize]
}

/// Probability of a correct response at the given ability.
pub fn expected_correct(theta: f64, level: u8) -> f64 {
    sigmoid(theta - challenge(level))
}

/// p(1-p), the Fisher information of a 1PL item at `theta`.
pub fn item_information(theta: f64, level: u8) -> f64 {
    let p = expected_correct(theta, level);
    p * (1.0 - p)
}
