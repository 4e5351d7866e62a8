use super::irt::sigmoid;
use super::types::MasteryBand;

pub const MIN_MASTERY_SCORE: f64 = 1.0;
pub const MAX_MASTERY_SCORE: f64 = 4.0;

const HEAVY_BELOW: f64 = 2.4;
const MEDIUM_BELOW: f64 = 3.1;

/// Maps theta onto the bounded 1..4 mastery scale.
pub fn theta_to_mastery_score(theta: f64) -> f64 {
    (1.0 + 3.0 * sigmoid(theta)).clamp(MIN_MASTERY_SCORE, MAX_MASTERY_SCORE)
}

pub fn mastery_band_from_score(score: f64) -> MasteryBand {
    if score < HEAVY_BELOW {
        MasteryBand::Heavy
    } else if score < MEDIUM_BELOW {
        MasteryBand::Medium
    } else {
        MasteryBand::Light
    }
}
