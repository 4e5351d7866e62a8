use std::collections::BTreeMap;

use super::types::{count_touched, ObjectiveId, ObjectiveTally};

pub const MIN_QUESTIONS: u32 = 3;
pub const MAX_QUESTIONS: u32 = 7;
pub const STOP_UNCERTAINTY: f64 = 0.38;
pub const MIN_OBJECTIVES_TOUCHED: usize = 3;

/// Confidence-plus-breadth termination: hard floor of 3 questions, hard
/// ceiling of 7, and in between stop once uncertainty is low enough and at
/// least three objectives have been touched.
pub fn should_stop(
    asked_count: u32,
    uncertainty: f64,
    objective_coverage: &BTreeMap<ObjectiveId, ObjectiveTally>,
) -> bool {
    if asked_count >= MAX_QUESTIONS {
        return true;
    }
    if asked_count < MIN_QUESTIONS {
        return false;
    }
    uncertainty <= STOP_UNCERTAINTY && count_touched(objective_coverage) >= MIN_OBJECTIVES_TOUCHED
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(objectives: &[&str]) -> BTreeMap<ObjectiveId, ObjectiveTally> {
        objectives
            .iter()
            .map(|id| {
                (
                    id.to_string(),
                    ObjectiveTally {
                        asked: 1,
                        correct: 1,
                        incorrect: 0,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_floor_and_ceiling() {
        let wide = coverage(&["a", "b", "c", "d"]);
        assert!(!should_stop(2, 0.22, &wide));
        assert!(should_stop(7, 1.0, &BTreeMap::new()));
    }

    #[test]
    fn test_requires_low_uncertainty() {
        let wide = coverage(&["a", "b", "c"]);
        assert!(!should_stop(4, 0.39, &wide));
        assert!(should_stop(4, 0.38, &wide));
    }

    #[test]
    fn test_untouched_objectives_do_not_count() {
        let mut cov = coverage(&["a", "b"]);
        cov.insert("c".into(), ObjectiveTally::default());
        assert!(!should_stop(5, 0.3, &cov));
    }
}
