use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cat::EngineState;
use crate::session::memory::MemoryStore;
use crate::session::sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("attempt already exists: {0}")]
    DuplicateAttempt(String),
    #[error("attempt not found: {0}")]
    NotFound(String),
    #[error("answer for item {item_id} already recorded on attempt {attempt_id}")]
    DuplicateAnswer { attempt_id: String, item_id: String },
    #[error("attempt {attempt_id} is no longer at version {expected_version}")]
    StaleWrite {
        attempt_id: String,
        expected_version: i64,
    },
    #[error("invalid stored value: {0}")]
    Corrupt(String),
    #[error("sql error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("state encoding failed: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Active,
    Completed,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Active => "active",
            AttemptStatus::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(AttemptStatus::Active),
            "completed" => Some(AttemptStatus::Completed),
            _ => None,
        }
    }
}

/// Why an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The stopping rule fired after an answer.
    StoppingRule,
    /// No unused item remained in the concept's pool.
    PoolExhausted,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::StoppingRule => "stopping_rule",
            FinishReason::PoolExhausted => "pool_exhausted",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "stopping_rule" => Some(FinishReason::StoppingRule),
            "pool_exhausted" => Some(FinishReason::PoolExhausted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptRecord {
    pub id: String,
    pub learner_id: String,
    pub concept_id: String,
    pub status: AttemptStatus,
    pub finish_reason: Option<FinishReason>,
    pub pending_item_id: Option<String>,
    /// Bumped on every committed answer; guards against lost updates.
    pub version: i64,
    pub state: EngineState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn is_completed(&self) -> bool {
        self.status == AttemptStatus::Completed
    }

    pub fn complete(&mut self, reason: FinishReason) {
        self.status = AttemptStatus::Completed;
        self.finish_reason = Some(reason);
        self.pending_item_id = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRecord {
    pub attempt_id: String,
    pub item_id: String,
    pub concept_id: String,
    pub selected_index: usize,
    pub is_correct: bool,
    pub misconception_tag: String,
    pub answered_at: DateTime<Utc>,
}

/// Persistence backend for attempts and their answer rows.
///
/// Answer rows are unique per `(attempt_id, item_id)`; `commit_answer`
/// writes the answer and the updated attempt atomically.
#[derive(Clone)]
pub enum AttemptStore {
    Memory(Arc<MemoryStore>),
    Sqlite(SqliteStore),
}

impl AttemptStore {
    pub fn memory() -> Self {
        AttemptStore::Memory(Arc::new(MemoryStore::default()))
    }

    pub async fn sqlite(url: &str) -> Result<Self, StoreError> {
        Ok(AttemptStore::Sqlite(SqliteStore::connect(url).await?))
    }

    pub fn backend(&self) -> &'static str {
        match self {
            AttemptStore::Memory(_) => "memory",
            AttemptStore::Sqlite(_) => "sqlite",
        }
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            AttemptStore::Memory(_) => Ok(()),
            AttemptStore::Sqlite(store) => store.ping().await,
        }
    }

    pub async fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<(), StoreError> {
        match self {
            AttemptStore::Memory(store) => store.insert_attempt(attempt),
            AttemptStore::Sqlite(store) => store.insert_attempt(attempt).await,
        }
    }

    pub async fn load_attempt(&self, attempt_id: &str) -> Result<Option<AttemptRecord>, StoreError> {
        match self {
            AttemptStore::Memory(store) => Ok(store.load_attempt(attempt_id)),
            AttemptStore::Sqlite(store) => store.load_attempt(attempt_id).await,
        }
    }

    pub async fn find_answer(
        &self,
        attempt_id: &str,
        item_id: &str,
    ) -> Result<Option<AnswerRecord>, StoreError> {
        match self {
            AttemptStore::Memory(store) => Ok(store.find_answer(attempt_id, item_id)),
            AttemptStore::Sqlite(store) => store.find_answer(attempt_id, item_id).await,
        }
    }

    pub async fn commit_answer(
        &self,
        answer: &AnswerRecord,
        attempt: &AttemptRecord,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        match self {
            AttemptStore::Memory(store) => store.commit_answer(answer, attempt, expected_version),
            AttemptStore::Sqlite(store) => store.commit_answer(answer, attempt, expected_version).await,
        }
    }

    /// Answers per item across every attempt on `concept_id`.
    pub async fn usage_counts(&self, concept_id: &str) -> Result<HashMap<String, u32>, StoreError> {
        match self {
            AttemptStore::Memory(store) => Ok(store.usage_counts(concept_id)),
            AttemptStore::Sqlite(store) => store.usage_counts(concept_id).await,
        }
    }

    /// Answers for one attempt in submission order.
    pub async fn answers(&self, attempt_id: &str) -> Result<Vec<AnswerRecord>, StoreError> {
        match self {
            AttemptStore::Memory(store) => Ok(store.answers(attempt_id)),
            AttemptStore::Sqlite(store) => store.answers(attempt_id).await,
        }
    }
}
