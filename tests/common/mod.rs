#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;

use mastery_cat::bank::ItemBank;
use mastery_cat::cat::types::{Item, CORRECT_TAG};
use mastery_cat::session::{AttemptStore, SessionOrchestrator};
use mastery_cat::state::AppState;

pub fn make_item(concept: &str, id: &str, objective: &str, level: u8, correct_index: usize) -> Item {
    let mut tags: [String; 4] = [
        "misread".to_string(),
        "sign_flip".to_string(),
        "guess".to_string(),
        "partial".to_string(),
    ];
    tags[correct_index] = CORRECT_TAG.to_string();
    Item {
        id: id.to_string(),
        concept_id: concept.to_string(),
        objective_id: objective.to_string(),
        difficulty_level: level,
        prompt: format!("{id}?"),
        options: [
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "d".to_string(),
        ],
        correct_index,
        misconception_tags: tags,
    }
}

/// Bank with a two-item concept, used to force pool exhaustion.
pub fn tiny_bank() -> Arc<ItemBank> {
    let json = r#"{
        "concepts": [
            {
                "id": "tiny",
                "title": "Tiny",
                "coreObjectives": ["tiny.a"],
                "items": [
                    {
                        "id": "tiny.a.1", "conceptId": "tiny", "objectiveId": "tiny.a",
                        "difficultyLevel": 3, "prompt": "first",
                        "options": ["1", "2", "3", "4"], "correctIndex": 0,
                        "misconceptionTags": ["correct", "off_by_one", "guess", "sign_flip"]
                    },
                    {
                        "id": "tiny.b.1", "conceptId": "tiny", "objectiveId": "tiny.b",
                        "difficultyLevel": 2, "prompt": "second",
                        "options": ["1", "2", "3", "4"], "correctIndex": 1,
                        "misconceptionTags": ["off_by_one", "correct", "guess", "sign_flip"]
                    }
                ]
            },
            { "id": "empty", "title": "Empty", "items": [] }
        ]
    }"#;
    Arc::new(ItemBank::from_json_str(json).expect("tiny bank is valid"))
}

pub fn memory_orchestrator() -> SessionOrchestrator {
    SessionOrchestrator::new(ItemBank::builtin(), AttemptStore::memory())
}

pub fn create_test_app() -> Router {
    let state = AppState::new(ItemBank::builtin(), AttemptStore::memory());
    mastery_cat::build_router(state)
}

/// Index of the correct option for a built-in item.
pub fn correct_index(concept_id: &str, item_id: &str) -> usize {
    ItemBank::builtin()
        .item(concept_id, item_id)
        .map(|item| item.correct_index)
        .expect("item exists in built-in bank")
}

/// Some wrong option for a built-in item.
pub fn wrong_index(concept_id: &str, item_id: &str) -> usize {
    (correct_index(concept_id, item_id) + 1) % 4
}
