//! Attempt lifecycle on top of the pure engine: persistence, at-most-once
//! answer application and result assembly.

pub mod memory;
pub mod orchestrator;
pub mod sqlite;
pub mod store;

pub use orchestrator::{
    AttemptProgress, AttemptResult, AttemptView, MisconceptionCount, ObjectiveBreakdown,
    QuestionView, SessionError, SessionOrchestrator, SubmitOutcome,
};
pub use store::{AnswerRecord, AttemptRecord, AttemptStatus, AttemptStore, FinishReason, StoreError};
