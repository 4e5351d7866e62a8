//! Next-item selection.
//!
//! Greedy single-step policy: maximize item information at the current
//! theta, with side constraints for objective coverage, preferred (core)
//! objectives, difficulty smoothing and pool-level fairness. Ties are broken
//! by a deterministic per-session hash so no random source is needed.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::irt::item_information;
use super::types::{EngineState, Item, ItemId, ObjectiveId, MAX_DIFFICULTY, MIN_DIFFICULTY};

const UNDER_COVERED_BONUS: f64 = 0.35;
const PREFERRED_BONUS: f64 = 0.12;
const DIFFICULTY_DISTANCE_PENALTY: f64 = 0.15;
const USAGE_PENALTY: f64 = 0.01;
const TIE_NOISE_SCALE: f64 = 0.001;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Per-candidate score breakdown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredCandidate<'a> {
    #[serde(skip)]
    pub item: &'a Item,
    pub information: f64,
    pub coverage_bonus: f64,
    pub preference_bonus: f64,
    pub difficulty_penalty: f64,
    pub usage_penalty: f64,
    pub tie_noise: f64,
    pub total: f64,
}

/// Returns the best unused item, or `None` when every item in `pool` has
/// already been administered in this attempt.
pub fn choose_next_item<'a>(
    pool: &'a [Item],
    state: &EngineState,
    usage_counts: &HashMap<ItemId, u32>,
    preferred_objective_ids: &[ObjectiveId],
) -> Option<&'a Item> {
    rank_candidates(pool, state, usage_counts, preferred_objective_ids)
        .into_iter()
        .next()
        .map(|candidate| candidate.item)
}

/// Scores every unused item, best first.
pub fn rank_candidates<'a>(
    pool: &'a [Item],
    state: &EngineState,
    usage_counts: &HashMap<ItemId, u32>,
    preferred_objective_ids: &[ObjectiveId],
) -> Vec<ScoredCandidate<'a>> {
    let used: HashSet<&str> = state.used_item_ids.iter().map(String::as_str).collect();
    let candidates: Vec<&Item> = pool
        .iter()
        .filter(|item| !used.contains(item.id.as_str()))
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let min_coverage = candidates
        .iter()
        .map(|item| state.asked_for(&item.objective_id))
        .min()
        .unwrap_or(0);
    let target = target_difficulty(state.mastery_theta, state.last_difficulty());
    let preferred: HashSet<&str> = preferred_objective_ids.iter().map(String::as_str).collect();

    let mut scored: Vec<ScoredCandidate<'a>> = candidates
        .into_iter()
        .map(|item| {
            let information = item_information(state.mastery_theta, item.difficulty_level);
            let coverage_bonus = if state.asked_for(&item.objective_id) == min_coverage {
                UNDER_COVERED_BONUS
            } else {
                0.0
            };
            let preference_bonus = if preferred.contains(item.objective_id.as_str()) {
                PREFERRED_BONUS
            } else {
                0.0
            };
            let distance = (i32::from(item.difficulty_level) - i32::from(target)).unsigned_abs();
            let difficulty_penalty = DIFFICULTY_DISTANCE_PENALTY * f64::from(distance);
            let usage = usage_counts.get(&item.id).copied().unwrap_or(0);
            let usage_penalty = USAGE_PENALTY * f64::from(usage);
            let tie_noise = tie_noise(&state.session_seed, &item.id);

            ScoredCandidate {
                item,
                information,
                coverage_bonus,
                preference_bonus,
                difficulty_penalty,
                usage_penalty,
                tie_noise,
                total: information + coverage_bonus + preference_bonus - difficulty_penalty
                    - usage_penalty
                    + tie_noise,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.item.id.cmp(&b.item.id))
    });
    scored
}

/// Difficulty level the selector aims for at `theta`, moved at most one
/// step away from the previously administered level.
pub fn target_difficulty(theta: f64, last_level: Option<u8>) -> u8 {
    let raw: u8 = if theta < -0.75 {
        1
    } else if theta < 0.0 {
        2
    } else if theta < 0.75 {
        3
    } else {
        4
    };

    let smoothed = match last_level {
        Some(last) => raw.clamp(last.saturating_sub(1), last.saturating_add(1)),
        None => raw,
    };
    smoothed.clamp(MIN_DIFFICULTY, MAX_DIFFICULTY)
}

/// Deterministic value in (0, 0.001) for `seed + item_id`.
pub fn tie_noise(seed: &str, item_id: &str) -> f64 {
    let hash = fnv1a32(seed.bytes().chain(item_id.bytes()));
    (f64::from(hash) + 1.0) / (f64::from(u32::MAX) + 2.0) * TIE_NOISE_SCALE
}

fn fnv1a32(bytes: impl Iterator<Item = u8>) -> u32 {
    bytes.fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(FNV_PRIME)
    })
}
