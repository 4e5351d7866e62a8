use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ItemId = String;
pub type ObjectiveId = String;

pub const OPTION_COUNT: usize = 4;
pub const MIN_DIFFICULTY: u8 = 1;
pub const MAX_DIFFICULTY: u8 = 4;

pub const THETA_MIN: f64 = -3.0;
pub const THETA_MAX: f64 = 3.0;
pub const INITIAL_THETA: f64 = 0.0;
pub const INITIAL_UNCERTAINTY: f64 = 1.0;
pub const UNCERTAINTY_FLOOR: f64 = 0.22;
pub const TRAIL_LEN: usize = 6;

pub const CORRECT_TAG: &str = "correct";
pub const UNKNOWN_TAG: &str = "unknown";

/// One multiple-choice question from the item pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub concept_id: String,
    pub objective_id: ObjectiveId,
    /// 1 (easiest) to 4 (hardest)
    pub difficulty_level: u8,
    #[serde(default)]
    pub prompt: String,
    pub options: [String; OPTION_COUNT],
    pub correct_index: usize,
    pub misconception_tags: [String; OPTION_COUNT],
}

impl Item {
    pub fn is_correct(&self, selected_index: usize) -> bool {
        selected_index == self.correct_index
    }

    pub fn misconception_for(&self, selected_index: usize) -> &str {
        self.misconception_tags
            .get(selected_index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_TAG)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectiveTally {
    pub asked: u32,
    pub correct: u32,
    pub incorrect: u32,
}

impl ObjectiveTally {
    pub fn record(&mut self, is_correct: bool) {
        self.asked += 1;
        if is_correct {
            self.correct += 1;
        } else {
            self.incorrect += 1;
        }
    }

    pub fn accuracy(&self) -> f64 {
        if self.asked == 0 {
            0.0
        } else {
            self.correct as f64 / self.asked as f64
        }
    }
}

/// Snapshot of one learner's progress through one assessment attempt.
///
/// Values are replaced wholesale by [`apply_answer`](crate::cat::apply_answer);
/// callers never mutate a state in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    /// Ability estimate, clamped to [-3, 3]
    pub mastery_theta: f64,
    /// Always derived from `mastery_theta`
    pub mastery_score: f64,
    /// Heuristic confidence term, never below 0.22 and never increasing
    pub uncertainty: f64,
    pub asked_count: u32,
    pub used_item_ids: Vec<ItemId>,
    pub objective_coverage: BTreeMap<ObjectiveId, ObjectiveTally>,
    pub recent_difficulty_trail: Vec<u8>,
    pub session_seed: String,
}

impl EngineState {
    pub fn has_used(&self, item_id: &str) -> bool {
        self.used_item_ids.iter().any(|id| id == item_id)
    }

    pub fn objectives_touched(&self) -> usize {
        count_touched(&self.objective_coverage)
    }

    pub fn asked_for(&self, objective_id: &str) -> u32 {
        self.objective_coverage
            .get(objective_id)
            .map(|tally| tally.asked)
            .unwrap_or(0)
    }

    pub fn last_difficulty(&self) -> Option<u8> {
        self.recent_difficulty_trail.last().copied()
    }
}

pub(crate) fn count_touched(coverage: &BTreeMap<ObjectiveId, ObjectiveTally>) -> usize {
    coverage.values().filter(|tally| tally.asked >= 1).count()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub state: EngineState,
    pub is_correct: bool,
    pub misconception_tag: String,
    pub stop: bool,
}

/// Coarse teaching-intervention tier derived from the mastery score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MasteryBand {
    Heavy,
    Medium,
    Light,
}

impl MasteryBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryBand::Heavy => "heavy",
            MasteryBand::Medium => "medium",
            MasteryBand::Light => "light",
        }
    }
}

impl std::fmt::Display for MasteryBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
