//! Ability update after each answer.
//!
//! Theta moves by a fixed-step correction toward the observed outcome
//! (step 0.55) and uncertainty decays at a fixed rate (0.82) down to a floor.
//! Neither is a posterior computation; the constants are kept as tuned.

use std::collections::BTreeMap;

use super::irt::expected_correct;
use super::scoring::theta_to_mastery_score;
use super::stopping::should_stop;
use super::types::{
    AnswerOutcome, EngineState, Item, INITIAL_THETA, INITIAL_UNCERTAINTY, THETA_MAX,
    THETA_MIN, TRAIL_LEN, UNCERTAINTY_FLOOR,
};

const THETA_STEP: f64 = 0.55;
const UNCERTAINTY_DECAY: f64 = 0.82;

pub fn create_initial_state(seed: &str) -> EngineState {
    EngineState {
        mastery_theta: INITIAL_THETA,
        mastery_score: theta_to_mastery_score(INITIAL_THETA),
        uncertainty: INITIAL_UNCERTAINTY,
        asked_count: 0,
        used_item_ids: Vec::new(),
        objective_coverage: BTreeMap::new(),
        recent_difficulty_trail: Vec::new(),
        session_seed: seed.to_string(),
    }
}

/// Applies one answered item and returns the successor state.
///
/// `selected_index` is validated by the caller; an out-of-range index is
/// scored as incorrect with the `"unknown"` misconception tag.
pub fn apply_answer(state: &EngineState, item: &Item, selected_index: usize) -> AnswerOutcome {
    let expected = expected_correct(state.mastery_theta, item.difficulty_level);
    let is_correct = item.is_correct(selected_index);
    let actual = if is_correct { 1.0 } else { 0.0 };

    let mastery_theta =
        (state.mastery_theta + THETA_STEP * (actual - expected)).clamp(THETA_MIN, THETA_MAX);
    let uncertainty = (state.uncertainty * UNCERTAINTY_DECAY).max(UNCERTAINTY_FLOOR);

    let mut objective_coverage = state.objective_coverage.clone();
    objective_coverage
        .entry(item.objective_id.clone())
        .or_default()
        .record(is_correct);

    let mut recent_difficulty_trail = state.recent_difficulty_trail.clone();
    recent_difficulty_trail.push(item.difficulty_level);
    if recent_difficulty_trail.len() > TRAIL_LEN {
        let excess = recent_difficulty_trail.len() - TRAIL_LEN;
        recent_difficulty_trail.drain(..excess);
    }

    let mut used_item_ids = state.used_item_ids.clone();
    used_item_ids.push(item.id.clone());

    let asked_count = state.asked_count + 1;
    let misconception_tag = item.misconception_for(selected_index).to_string();
    let stop = should_stop(asked_count, uncertainty, &objective_coverage);

    AnswerOutcome {
        state: EngineState {
            mastery_theta,
            mastery_score: theta_to_mastery_score(mastery_theta),
            uncertainty,
            asked_count,
            used_item_ids,
            objective_coverage,
            recent_difficulty_trail,
            session_seed: state.session_seed.clone(),
        },
        is_correct,
        misconception_tag,
        stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cat::types::{CORRECT_TAG, UNKNOWN_TAG};

    fn item(id: &str, objective: &str, level: u8) -> Item {
        Item {
            id: id.into(),
            concept_id: "c".into(),
            objective_id: objective.into(),
            difficulty_level: level,
            prompt: String::new(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 1,
            misconception_tags: ["sign_flip".into(), CORRECT_TAG.into(), "off_by_one".into(), "guess".into()],
        }
    }

    #[test]
    fn test_initial_state() {
        let state = create_initial_state("abc");
        assert_eq!(state.mastery_theta, 0.0);
        assert!((state.mastery_score - 2.5).abs() < 1e-12);
        assert_eq!(state.uncertainty, 1.0);
        assert_eq!(state.asked_count, 0);
        assert_eq!(state.session_seed, "abc");
    }

    #[test]
    fn test_correct_answer_raises_theta() {
        let state = create_initial_state("s");
        let outcome = apply_answer(&state, &item("i1", "o1", 2), 1);
        assert!(outcome.is_correct);
        assert_eq!(outcome.misconception_tag, CORRECT_TAG);
        assert!(outcome.state.mastery_theta > 0.0);
        assert!(outcome.state.mastery_score > state.mastery_score);
    }

    #[test]
    fn test_wrong_answer_reports_misconception() {
        let state = create_initial_state("s");
        let outcome = apply_answer(&state, &item("i1", "o1", 2), 2);
        assert!(!outcome.is_correct);
        assert_eq!(outcome.misconception_tag, "off_by_one");
        assert!(outcome.state.mastery_theta < 0.0);
        let tally = outcome.state.objective_coverage["o1"];
        assert_eq!((tally.asked, tally.correct, tally.incorrect), (1, 0, 1));
    }

    #[test]
    fn test_out_of_range_index_is_unknown() {
        let state = create_initial_state("s");
        let outcome = apply_answer(&state, &item("i1", "o1", 2), 7);
        assert!(!outcome.is_correct);
        assert_eq!(outcome.misconception_tag, UNKNOWN_TAG);
    }

    #[test]
    fn test_step_size_matches_expectation_gap() {
        let state = create_initial_state("s");
        let outcome = apply_answer(&state, &item("i1", "o1", 4), 1);
        let expected = expected_correct(0.0, 4);
        assert!((outcome.state.mastery_theta - 0.55 * (1.0 - expected)).abs() < 1e-12);
    }

    #[test]
    fn test_uncertainty_decays_to_floor() {
        let mut state = create_initial_state("s");
        for n in 0..20 {
            let outcome = apply_answer(&state, &item(&format!("i{n}"), "o1", 3), 1);
            assert!(outcome.state.uncertainty <= state.uncertainty);
            state = outcome.state;
        }
        assert_eq!(state.uncertainty, UNCERTAINTY_FLOOR);
    }

    #[test]
    fn test_trail_keeps_last_six() {
        let mut state = create_initial_state("s");
        let levels = [1u8, 2, 3, 4, 3, 2, 1, 2];
        for (n, level) in levels.iter().enumerate() {
            state = apply_answer(&state, &item(&format!("i{n}"), "o1", *level), 1).state;
        }
        assert_eq!(state.recent_difficulty_trail, vec![3, 4, 3, 2, 1, 2]);
        assert_eq!(state.asked_count, 8);
        assert_eq!(state.used_item_ids.len(), 8);
    }

    #[test]
    fn test_input_state_untouched() {
        let state = create_initial_state("s");
        let before = state.clone();
        let _ = apply_answer(&state, &item("i1", "o1", 2), 0);
        assert_eq!(state, before);
    }

    #[test]
    fn test_theta_clamped() {
        let mut state = create_initial_state("s");
        state.mastery_theta = 2.99;
        let outcome = apply_answer(&state, &item("i1", "o1", 1), 1);
        assert!(outcome.state.mastery_theta <= THETA_MAX);
    }
}
