//! Persisted representation of [`EngineState`].
//!
//! Ordered lists stay JSON arrays, objective coverage is a JSON object keyed
//! by objective id. The mastery score is written for readers of the stored
//! row but is always re-derived from theta on load.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::scoring::theta_to_mastery_score;
use super::types::{
    EngineState, ItemId, ObjectiveId, ObjectiveTally, INITIAL_UNCERTAINTY, THETA_MAX, THETA_MIN,
    TRAIL_LEN, UNCERTAINTY_FLOOR,
};

pub const STATE_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    STATE_SCHEMA_VERSION
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedEngineState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub mastery_theta: f64,
    pub mastery_score: f64,
    pub uncertainty: f64,
    pub asked_count: u32,
    #[serde(default)]
    pub used_item_ids: Vec<ItemId>,
    #[serde(default)]
    pub objective_coverage: BTreeMap<ObjectiveId, ObjectiveTally>,
    #[serde(default)]
    pub recent_difficulty_trail: Vec<u8>,
    pub session_seed: String,
}

impl From<&EngineState> for PersistedEngineState {
    fn from(state: &EngineState) -> Self {
        Self {
            schema_version: STATE_SCHEMA_VERSION,
            mastery_theta: state.mastery_theta,
            mastery_score: state.mastery_score,
            uncertainty: state.uncertainty,
            asked_count: state.asked_count,
            used_item_ids: state.used_item_ids.clone(),
            objective_coverage: state.objective_coverage.clone(),
            recent_difficulty_trail: state.recent_difficulty_trail.clone(),
            session_seed: state.session_seed.clone(),
        }
    }
}

impl From<PersistedEngineState> for EngineState {
    fn from(persisted: PersistedEngineState) -> Self {
        let mastery_theta = if persisted.mastery_theta.is_finite() {
            persisted.mastery_theta.clamp(THETA_MIN, THETA_MAX)
        } else {
            0.0
        };
        let uncertainty = if persisted.uncertainty.is_finite() {
            persisted
                .uncertainty
                .clamp(UNCERTAINTY_FLOOR, INITIAL_UNCERTAINTY)
        } else {
            INITIAL_UNCERTAINTY
        };

        let mut trail = persisted.recent_difficulty_trail;
        if trail.len() > TRAIL_LEN {
            let excess = trail.len() - TRAIL_LEN;
            trail.drain(..excess);
        }

        Self {
            mastery_theta,
            mastery_score: theta_to_mastery_score(mastery_theta),
            uncertainty,
            asked_count: persisted.asked_count,
            used_item_ids: persisted.used_item_ids,
            objective_coverage: persisted.objective_coverage,
            recent_difficulty_trail: trail,
            session_seed: persisted.session_seed,
        }
    }
}

pub fn encode_state(state: &EngineState) -> Result<serde_json::Value, serde_json::Error> {
    serde_json::to_value(PersistedEngineState::from(state))
}

pub fn decode_state(value: serde_json::Value) -> Result<EngineState, serde_json::Error> {
    let persisted: PersistedEngineState = serde_json::from_value(value)?;
    Ok(persisted.into())
}

pub fn state_to_json(state: &EngineState) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PersistedEngineState::from(state))
}

pub fn state_from_json(json: &str) -> Result<EngineState, serde_json::Error> {
    let persisted: PersistedEngineState = serde_json::from_str(json)?;
    Ok(persisted.into())
}
