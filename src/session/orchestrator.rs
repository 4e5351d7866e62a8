use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::bank::{Concept, ItemBank};
use crate::cat::types::OPTION_COUNT;
use crate::cat::{
    apply_answer, choose_next_item, create_initial_state, mastery_band_from_score, Item,
    MasteryBand,
};
use crate::session::store::{
    AnswerRecord, AttemptRecord, AttemptStatus, AttemptStore, FinishReason, StoreError,
};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("unknown concept: {0}")]
    UnknownConcept(String),
    #[error("attempt not found: {0}")]
    AttemptNotFound(String),
    #[error("selected index {0} is outside 0..=3")]
    InvalidSelection(i64),
    #[error("item {item_id} is not the pending question of attempt {attempt_id}")]
    NotPending { attempt_id: String, item_id: String },
    #[error("attempt {0} is already completed")]
    AttemptClosed(String),
    #[error("attempt {0} was modified concurrently")]
    Conflict(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub item_id: String,
    pub objective_id: String,
    pub difficulty_level: u8,
    pub prompt: String,
    pub options: [String; OPTION_COUNT],
}

impl From<&Item> for QuestionView {
    fn from(item: &Item) -> Self {
        Self {
            item_id: item.id.clone(),
            objective_id: item.objective_id.clone(),
            difficulty_level: item.difficulty_level,
            prompt: item.prompt.clone(),
            options: item.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptProgress {
    pub asked_count: u32,
    pub mastery_score: f64,
    pub uncertainty: f64,
    pub objectives_touched: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveBreakdown {
    pub objective_id: String,
    pub asked: u32,
    pub correct: u32,
    pub incorrect: u32,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MisconceptionCount {
    pub tag: String,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub mastery_score: f64,
    pub band: MasteryBand,
    pub mastery_theta: f64,
    pub asked_count: u32,
    pub finish_reason: FinishReason,
    pub objectives: Vec<ObjectiveBreakdown>,
    pub misconceptions: Vec<MisconceptionCount>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub attempt_id: String,
    pub learner_id: String,
    pub concept_id: String,
    pub status: AttemptStatus,
    pub progress: AttemptProgress,
    pub question: Option<QuestionView>,
    pub result: Option<AttemptResult>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub is_correct: bool,
    pub misconception_tag: String,
    /// True when this submission duplicated one already applied.
    pub replayed: bool,
    pub attempt: AttemptView,
}

/// Drives attempts through the engine and persists every step.
///
/// Each answer is applied at most once: a submission whose
/// `(attempt, item)` pair is already recorded replays the stored outcome
/// instead of calling the updater again.
pub struct SessionOrchestrator {
    bank: Arc<ItemBank>,
    store: AttemptStore,
}

impl SessionOrchestrator {
    pub fn new(bank: Arc<ItemBank>, store: AttemptStore) -> Self {
        Self { bank, store }
    }

    pub fn bank(&self) -> &ItemBank {
        &self.bank
    }

    pub fn store(&self) -> &AttemptStore {
        &self.store
    }

    pub async fn start_attempt(
        &self,
        learner_id: &str,
        concept_id: &str,
    ) -> Result<AttemptView, SessionError> {
        let learner_id = learner_id.trim();
        if learner_id.is_empty() {
            return Err(SessionError::Validation("learnerId is required".to_string()));
        }
        let concept = self.concept(concept_id)?;

        let seed = Uuid::new_v4().simple().to_string();
        let state = create_initial_state(&seed);
        let usage = self.store.usage_counts(&concept.id).await?;
        let first = choose_next_item(&concept.items, &state, &usage, &concept.core_objectives);

        let now = Utc::now();
        let mut record = AttemptRecord {
            id: Uuid::new_v4().to_string(),
            learner_id: learner_id.to_string(),
            concept_id: concept.id.clone(),
            status: AttemptStatus::Active,
            finish_reason: None,
            pending_item_id: first.map(|item| item.id.clone()),
            version: 0,
            state,
            created_at: now,
            updated_at: now,
        };
        if first.is_none() {
            tracing::warn!(concept_id = %concept.id, "concept has no items, attempt finalized immediately");
            record.complete(FinishReason::PoolExhausted);
        }

        self.store.insert_attempt(&record).await?;
        tracing::info!(
            attempt_id = %record.id,
            learner_id = %record.learner_id,
            concept_id = %record.concept_id,
            "assessment attempt started"
        );

        self.view(&record).await
    }

    pub async fn current(&self, attempt_id: &str) -> Result<AttemptView, SessionError> {
        let record = self.load(attempt_id).await?;
        self.view(&record).await
    }

    pub async fn submit_answer(
        &self,
        attempt_id: &str,
        item_id: &str,
        selected_index: i64,
    ) -> Result<SubmitOutcome, SessionError> {
        let selected = usize::try_from(selected_index)
            .ok()
            .filter(|idx| *idx < OPTION_COUNT)
            .ok_or(SessionError::InvalidSelection(selected_index))?;

        // Read the record first: a commit racing past this point is caught by
        // the lookup below or by the store's uniqueness check on commit.
        let record = self.load(attempt_id).await?;
        if let Some(existing) = self.store.find_answer(attempt_id, item_id).await? {
            return self.replay(existing).await;
        }

        if record.is_completed() {
            return Err(SessionError::AttemptClosed(record.id));
        }
        if record.pending_item_id.as_deref() != Some(item_id) {
            return Err(SessionError::NotPending {
                attempt_id: record.id,
                item_id: item_id.to_string(),
            });
        }

        let concept = self.concept(&record.concept_id)?;
        let item = concept
            .items
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| SessionError::NotPending {
                attempt_id: record.id.clone(),
                item_id: item_id.to_string(),
            })?;

        let outcome = apply_answer(&record.state, item, selected);

        let mut next = record.clone();
        next.state = outcome.state;
        next.version = record.version + 1;
        next.updated_at = Utc::now();

        if outcome.stop {
            next.complete(FinishReason::StoppingRule);
        } else {
            let usage = self.store.usage_counts(&concept.id).await?;
            match choose_next_item(&concept.items, &next.state, &usage, &concept.core_objectives) {
                Some(candidate) => next.pending_item_id = Some(candidate.id.clone()),
                None => next.complete(FinishReason::PoolExhausted),
            }
        }

        let answer = AnswerRecord {
            attempt_id: record.id.clone(),
            item_id: item.id.clone(),
            concept_id: concept.id.clone(),
            selected_index: selected,
            is_correct: outcome.is_correct,
            misconception_tag: outcome.misconception_tag.clone(),
            answered_at: next.updated_at,
        };

        match self.store.commit_answer(&answer, &next, record.version).await {
            Ok(()) => {}
            Err(StoreError::DuplicateAnswer { .. }) | Err(StoreError::StaleWrite { .. }) => {
                return match self.store.find_answer(attempt_id, item_id).await? {
                    Some(existing) => {
                        tracing::warn!(attempt_id, item_id, "concurrent duplicate answer detected");
                        self.replay(existing).await
                    }
                    None => Err(SessionError::Conflict(record.id)),
                };
            }
            Err(err) => return Err(err.into()),
        }

        if let Some(reason) = next.finish_reason {
            tracing::info!(
                attempt_id = %next.id,
                asked_count = next.state.asked_count,
                mastery_score = next.state.mastery_score,
                finish_reason = reason.as_str(),
                "assessment attempt completed"
            );
        } else {
            tracing::debug!(
                attempt_id = %next.id,
                asked_count = next.state.asked_count,
                theta = next.state.mastery_theta,
                "answer applied"
            );
        }

        Ok(SubmitOutcome {
            is_correct: outcome.is_correct,
            misconception_tag: outcome.misconception_tag,
            replayed: false,
            attempt: self.view(&next).await?,
        })
    }

    async fn replay(&self, answer: AnswerRecord) -> Result<SubmitOutcome, SessionError> {
        let record = self.load(&answer.attempt_id).await?;
        tracing::info!(
            attempt_id = %answer.attempt_id,
            item_id = %answer.item_id,
            "duplicate answer submission replayed"
        );
        Ok(SubmitOutcome {
            is_correct: answer.is_correct,
            misconception_tag: answer.misconception_tag,
            replayed: true,
            attempt: self.view(&record).await?,
        })
    }

    async fn load(&self, attempt_id: &str) -> Result<AttemptRecord, SessionError> {
        self.store
            .load_attempt(attempt_id)
            .await?
            .ok_or_else(|| SessionError::AttemptNotFound(attempt_id.to_string()))
    }

    fn concept(&self, concept_id: &str) -> Result<&Concept, SessionError> {
        self.bank
            .concept(concept_id)
            .ok_or_else(|| SessionError::UnknownConcept(concept_id.to_string()))
    }

    async fn view(&self, record: &AttemptRecord) -> Result<AttemptView, SessionError> {
        let question = record
            .pending_item_id
            .as_deref()
            .and_then(|item_id| self.bank.item(&record.concept_id, item_id))
            .map(QuestionView::from);

        let result = match (record.status, record.finish_reason) {
            (AttemptStatus::Completed, Some(reason)) => {
                let answers = self.store.answers(&record.id).await?;
                Some(build_result(record, reason, &answers))
            }
            _ => None,
        };

        Ok(AttemptView {
            attempt_id: record.id.clone(),
            learner_id: record.learner_id.clone(),
            concept_id: record.concept_id.clone(),
            status: record.status,
            progress: AttemptProgress {
                asked_count: record.state.asked_count,
                mastery_score: record.state.mastery_score,
                uncertainty: record.state.uncertainty,
                objectives_touched: record.state.objectives_touched(),
            },
            question,
            result,
        })
    }
}

pub fn build_result(
    record: &AttemptRecord,
    finish_reason: FinishReason,
    answers: &[AnswerRecord],
) -> AttemptResult {
    let state = &record.state;
    let objectives = state
        .objective_coverage
        .iter()
        .map(|(objective_id, tally)| ObjectiveBreakdown {
            objective_id: objective_id.clone(),
            asked: tally.asked,
            correct: tally.correct,
            incorrect: tally.incorrect,
            accuracy: tally.accuracy(),
        })
        .collect();

    AttemptResult {
        mastery_score: state.mastery_score,
        band: mastery_band_from_score(state.mastery_score),
        mastery_theta: state.mastery_theta,
        asked_count: state.asked_count,
        finish_reason,
        objectives,
        misconceptions: summarize_misconceptions(answers),
    }
}

/// Tags of wrong answers, most frequent first.
pub fn summarize_misconceptions(answers: &[AnswerRecord]) -> Vec<MisconceptionCount> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for answer in answers.iter().filter(|a| !a.is_correct) {
        *counts.entry(answer.misconception_tag.as_str()).or_insert(0) += 1;
    }

    let mut summary: Vec<MisconceptionCount> = counts
        .into_iter()
        .map(|(tag, count)| MisconceptionCount {
            tag: tag.to_string(),
            count,
        })
        .collect();
    summary.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    summary
}
