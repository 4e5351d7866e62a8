use std::collections::HashMap;

use parking_lot::Mutex;

use crate::session::store::{AnswerRecord, AttemptRecord, StoreError};

#[derive(Default)]
struct MemoryInner {
    attempts: HashMap<String, AttemptRecord>,
    answers: Vec<AnswerRecord>,
}

/// In-process store used when no database is configured and in tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.attempts.contains_key(&attempt.id) {
            return Err(StoreError::DuplicateAttempt(attempt.id.clone()));
        }
        inner.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    pub fn load_attempt(&self, attempt_id: &str) -> Option<AttemptRecord> {
        self.inner.lock().attempts.get(attempt_id).cloned()
    }

    pub fn find_answer(&self, attempt_id: &str, item_id: &str) -> Option<AnswerRecord> {
        self.inner
            .lock()
            .answers
            .iter()
            .find(|a| a.attempt_id == attempt_id && a.item_id == item_id)
            .cloned()
    }

    pub fn commit_answer(
        &self,
        answer: &AnswerRecord,
        attempt: &AttemptRecord,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();

        let duplicate = inner
            .answers
            .iter()
            .any(|a| a.attempt_id == answer.attempt_id && a.item_id == answer.item_id);
        if duplicate {
            return Err(StoreError::DuplicateAnswer {
                attempt_id: answer.attempt_id.clone(),
                item_id: answer.item_id.clone(),
            });
        }

        match inner.attempts.get(&attempt.id) {
            None => return Err(StoreError::NotFound(attempt.id.clone())),
            Some(current) if current.version != expected_version => {
                return Err(StoreError::StaleWrite {
                    attempt_id: attempt.id.clone(),
                    expected_version,
                });
            }
            Some(_) => {}
        }

        inner.answers.push(answer.clone());
        inner.attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(())
    }

    pub fn usage_counts(&self, concept_id: &str) -> HashMap<String, u32> {
        let inner = self.inner.lock();
        let mut counts = HashMap::new();
        for answer in inner.answers.iter().filter(|a| a.concept_id == concept_id) {
            *counts.entry(answer.item_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn answers(&self, attempt_id: &str) -> Vec<AnswerRecord> {
        self.inner
            .lock()
            .answers
            .iter()
            .filter(|a| a.attempt_id == attempt_id)
            .cloned()
            .collect()
    }
}
