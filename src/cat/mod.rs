//! Adaptive assessment engine.
//!
//! Pure functions over an explicit [`EngineState`]:
//! - selector: picks the next unused item by information, coverage and fairness
//! - updater: fixed-step theta correction plus uncertainty decay
//! - stopping: confidence-plus-breadth termination
//! - scoring: theta to bounded mastery score and intervention band
//! - persistence: lossless JSON representation of the state

pub mod irt;
pub mod persistence;
pub mod scoring;
pub mod selector;
pub mod stopping;
pub mod types;
pub mod updater;

pub use persistence::{decode_state, encode_state, state_from_json, state_to_json, PersistedEngineState};
pub use scoring::{mastery_band_from_score, theta_to_mastery_score};
pub use selector::{choose_next_item, rank_candidates, ScoredCandidate};
pub use stopping::should_stop;
pub use types::{AnswerOutcome, EngineState, Item, ItemId, MasteryBand, ObjectiveId, ObjectiveTally};
pub use updater::{apply_answer, create_initial_state};
