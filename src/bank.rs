//! Item bank registry.
//!
//! Loaded once at startup and shared read-only (`Arc<ItemBank>`) by every
//! request. The built-in bank is generated from fixed templates and cached
//! in a process-wide `OnceLock`.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cat::types::{Item, ObjectiveId, CORRECT_TAG, MAX_DIFFICULTY, MIN_DIFFICULTY, OPTION_COUNT};

#[derive(Debug, Error)]
pub enum BankError {
    #[error("failed to read item bank {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid item bank json: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate concept id: {0}")]
    DuplicateConcept(String),
    #[error("duplicate item id: {0}")]
    DuplicateItem(String),
    #[error("item {item} declares concept {found}, expected {expected}")]
    ConceptMismatch {
        item: String,
        expected: String,
        found: String,
    },
    #[error("item {item} has difficulty {level}, expected 1..=4")]
    InvalidDifficulty { item: String, level: u8 },
    #[error("item {item} has correct index {index}, expected 0..=3")]
    InvalidCorrectIndex { item: String, index: usize },
    #[error("concept {concept} lists core objective {objective} with no items")]
    UnknownCoreObjective { concept: String, objective: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Concept {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub core_objectives: Vec<ObjectiveId>,
    pub items: Vec<Item>,
}

impl Concept {
    /// Distinct objective ids in item order.
    pub fn objective_ids(&self) -> Vec<ObjectiveId> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .filter(|item| seen.insert(item.objective_id.as_str()))
            .map(|item| item.objective_id.clone())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct BankFile {
    concepts: Vec<Concept>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemBank {
    concepts: BTreeMap<String, Concept>,
}

impl ItemBank {
    pub fn from_concepts(concepts: Vec<Concept>) -> Result<Self, BankError> {
        let mut map = BTreeMap::new();
        let mut item_ids = HashSet::new();

        for concept in concepts {
            validate_concept(&concept, &mut item_ids)?;
            if map.contains_key(&concept.id) {
                return Err(BankError::DuplicateConcept(concept.id));
            }
            map.insert(concept.id.clone(), concept);
        }

        Ok(Self { concepts: map })
    }

    pub fn from_json_str(json: &str) -> Result<Self, BankError> {
        let file: BankFile = serde_json::from_str(json)?;
        Self::from_concepts(file.concepts)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| BankError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn builtin() -> Arc<ItemBank> {
        static BUILTIN: OnceLock<Arc<ItemBank>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| Arc::new(build_builtin())))
    }

    pub fn concept(&self, concept_id: &str) -> Option<&Concept> {
        self.concepts.get(concept_id)
    }

    pub fn concepts(&self) -> impl Iterator<Item = &Concept> {
        self.concepts.values()
    }

    pub fn pool(&self, concept_id: &str) -> Option<&[Item]> {
        self.concept(concept_id).map(|c| c.items.as_slice())
    }

    pub fn item(&self, concept_id: &str, item_id: &str) -> Option<&Item> {
        self.pool(concept_id)?.iter().find(|item| item.id == item_id)
    }

    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }
}

fn validate_concept(concept: &Concept, item_ids: &mut HashSet<String>) -> Result<(), BankError> {
    for item in &concept.items {
        if !item_ids.insert(item.id.clone()) {
            return Err(BankError::DuplicateItem(item.id.clone()));
        }
        if item.concept_id != concept.id {
            return Err(BankError::ConceptMismatch {
                item: item.id.clone(),
                expected: concept.id.clone(),
                found: item.concept_id.clone(),
            });
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&item.difficulty_level) {
            return Err(BankError::InvalidDifficulty {
                item: item.id.clone(),
                level: item.difficulty_level,
            });
        }
        if item.correct_index >= OPTION_COUNT {
            return Err(BankError::InvalidCorrectIndex {
                item: item.id.clone(),
                index: item.correct_index,
            });
        }
    }

    for objective in &concept.core_objectives {
        if !concept.items.iter().any(|item| &item.objective_id == objective) {
            return Err(BankError::UnknownCoreObjective {
                concept: concept.id.clone(),
                objective: objective.clone(),
            });
        }
    }

    Ok(())
}

struct ObjectiveTemplate {
    id: &'static str,
    skill: &'static str,
    misconceptions: [&'static str; 3],
}

struct ConceptTemplate {
    id: &'static str,
    title: &'static str,
    objectives: [ObjectiveTemplate; 4],
}

const BUILTIN_CONCEPTS: &[ConceptTemplate] = &[
    ConceptTemplate {
        id: "fractions",
        title: "Fractions",
        objectives: [
            ObjectiveTemplate {
                id: "fractions.compare",
                skill: "Compare two fractions",
                misconceptions: ["bigger_denominator_bigger", "compare_numerators_only", "ignore_whole"],
            },
            ObjectiveTemplate {
                id: "fractions.equivalent",
                skill: "Find an equivalent fraction",
                misconceptions: ["add_same_number", "scale_one_part", "invert_fraction"],
            },
            ObjectiveTemplate {
                id: "fractions.add",
                skill: "Add fractions",
                misconceptions: ["add_denominators", "skip_common_denominator", "multiply_instead"],
            },
            ObjectiveTemplate {
                id: "fractions.number_line",
                skill: "Place a fraction on a number line",
                misconceptions: ["count_ticks_not_gaps", "denominator_as_position", "ignore_whole"],
            },
        ],
    },
    ConceptTemplate {
        id: "ratios",
        title: "Ratios and Rates",
        objectives: [
            ObjectiveTemplate {
                id: "ratios.simplify",
                skill: "Simplify a ratio",
                misconceptions: ["subtract_instead", "divide_one_side", "order_swapped"],
            },
            ObjectiveTemplate {
                id: "ratios.unit_rate",
                skill: "Compute a unit rate",
                misconceptions: ["divide_wrong_way", "additive_reasoning", "unit_confusion"],
            },
            ObjectiveTemplate {
                id: "ratios.proportion",
                skill: "Solve a proportion",
                misconceptions: ["additive_reasoning", "cross_add", "order_swapped"],
            },
            ObjectiveTemplate {
                id: "ratios.tables",
                skill: "Complete a ratio table",
                misconceptions: ["constant_difference", "skip_row", "scale_one_column"],
            },
        ],
    },
    ConceptTemplate {
        id: "linear_equations",
        title: "Linear Equations",
        objectives: [
            ObjectiveTemplate {
                id: "linear.one_step",
                skill: "Solve a one-step equation",
                misconceptions: ["inverse_operation_wrong", "sign_flip", "operate_one_side"],
            },
            ObjectiveTemplate {
                id: "linear.two_step",
                skill: "Solve a two-step equation",
                misconceptions: ["order_of_undoing", "sign_flip", "distribute_partially"],
            },
            ObjectiveTemplate {
                id: "linear.slope",
                skill: "Read slope from a graph",
                misconceptions: ["run_over_rise", "sign_flip", "use_intercept"],
            },
            ObjectiveTemplate {
                id: "linear.model",
                skill: "Write an equation for a situation",
                misconceptions: ["swap_rate_and_start", "additive_only", "unit_confusion"],
            },
        ],
    },
];

const CORE_OBJECTIVES_PER_CONCEPT: usize = 3;

fn build_builtin() -> ItemBank {
    let concepts = BUILTIN_CONCEPTS.iter().map(build_concept).collect();
    ItemBank::from_concepts(concepts).unwrap_or_default()
}

fn build_concept(template: &ConceptTemplate) -> Concept {
    let mut items = Vec::new();

    for (objective_idx, objective) in template.objectives.iter().enumerate() {
        for level in MIN_DIFFICULTY..=MAX_DIFFICULTY {
            let correct_index = (objective_idx + level as usize) % OPTION_COUNT;
            let mut distractors = objective.misconceptions.iter();
            let mut options: [String; OPTION_COUNT] = Default::default();
            let mut tags: [String; OPTION_COUNT] = Default::default();

            for slot in 0..OPTION_COUNT {
                if slot == correct_index {
                    options[slot] = format!("{} (sound reasoning)", objective.skill);
                    tags[slot] = CORRECT_TAG.to_string();
                } else {
                    let tag = distractors.next().copied().unwrap_or("guess");
                    options[slot] = format!("Answer showing {}", tag.replace('_', " "));
                    tags[slot] = tag.to_string();
                }
            }

            items.push(Item {
                id: format!("{}.l{}", objective.id, level),
                concept_id: template.id.to_string(),
                objective_id: objective.id.to_string(),
                difficulty_level: level,
                prompt: format!("{}: {} (level {})", template.title, objective.skill, level),
                options,
                correct_index,
                misconception_tags: tags,
            });
        }
    }

    Concept {
        id: template.id.to_string(),
        title: template.title.to_string(),
        core_objectives: template
            .objectives
            .iter()
            .take(CORE_OBJECTIVES_PER_CONCEPT)
            .map(|o| o.id.to_string())
            .collect(),
        items,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bank_shape() {
        let bank = ItemBank::builtin();
        assert_eq!(bank.len(), 3);
        let fractions = bank.concept("fractions").unwrap();
        assert_eq!(fractions.items.len(), 16);
        assert_eq!(fractions.objective_ids().len(), 4);
        assert_eq!(fractions.core_objectives.len(), 3);
        for item in &fractions.items {
            assert_eq!(item.misconception_tags[item.correct_index], CORRECT_TAG);
        }
    }

    #[test]
    fn test_builtin_is_shared() {
        let a = ItemBank::builtin();
        let b = ItemBank::builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_lookup() {
        let bank = ItemBank::builtin();
        assert!(bank.item("fractions", "fractions.add.l3").is_some());
        assert!(bank.item("ratios", "fractions.add.l3").is_none());
        assert!(bank.pool("geometry").is_none());
    }

    fn json_item(id: &str, concept: &str, level: u8, correct: usize) -> String {
        format!(
            r#"{{"id":"{id}","conceptId":"{concept}","objectiveId":"o1","difficultyLevel":{level},
                "options":["a","b","c","d"],"correctIndex":{correct},
                "misconceptionTags":["correct","x","y","z"]}}"#
        )
    }

    #[test]
    fn test_json_load() {
        let json = format!(
            r#"{{"concepts":[{{"id":"c1","title":"C1","coreObjectives":["o1"],"items":[{}]}}]}}"#,
            json_item("i1", "c1", 2, 0)
        );
        let bank = ItemBank::from_json_str(&json).unwrap();
        assert_eq!(bank.pool("c1").unwrap().len(), 1);
        assert_eq!(bank.item("c1", "i1").unwrap().prompt, "");
    }

    #[test]
    fn test_rejects_bad_difficulty() {
        let json = format!(
            r#"{{"concepts":[{{"id":"c1","title":"C1","items":[{}]}}]}}"#,
            json_item("i1", "c1", 5, 0)
        );
        assert!(matches!(
            ItemBank::from_json_str(&json),
            Err(BankError::InvalidDifficulty { level: 5, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_correct_index() {
        let json = format!(
            r#"{{"concepts":[{{"id":"c1","title":"C1","items":[{}]}}]}}"#,
            json_item("i1", "c1", 1, 4)
        );
        assert!(matches!(
            ItemBank::from_json_str(&json),
            Err(BankError::InvalidCorrectIndex { index: 4, .. })
        ));
    }

    #[test]
    fn test_rejects_duplicates_and_mismatch() {
        let dup = format!(
            r#"{{"concepts":[{{"id":"c1","title":"C1","items":[{},{}]}}]}}"#,
            json_item("i1", "c1", 1, 0),
            json_item("i1", "c1", 2, 0)
        );
        assert!(matches!(ItemBank::from_json_str(&dup), Err(BankError::DuplicateItem(_))));

        let mismatch = format!(
            r#"{{"concepts":[{{"id":"c1","title":"C1","items":[{}]}}]}}"#,
            json_item("i1", "c2", 1, 0)
        );
        assert!(matches!(
            ItemBank::from_json_str(&mismatch),
            Err(BankError::ConceptMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_wrong_option_count() {
        let json = r#"{"concepts":[{"id":"c1","title":"C1","items":[
            {"id":"i1","conceptId":"c1","objectiveId":"o1","difficultyLevel":1,
             "options":["a","b","c"],"correctIndex":0,
             "misconceptionTags":["correct","x","y"]}]}]}"#;
        assert!(matches!(ItemBank::from_json_str(json), Err(BankError::Parse(_))));
    }

    #[test]
    fn test_rejects_unknown_core_objective() {
        let json = format!(
            r#"{{"concepts":[{{"id":"c1","title":"C1","coreObjectives":["o9"],"items":[{}]}}]}}"#,
            json_item("i1", "c1", 1, 0)
        );
        assert!(matches!(
            ItemBank::from_json_str(&json),
            Err(BankError::UnknownCoreObjective { .. })
        ));
    }
}
