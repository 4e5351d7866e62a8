use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::response::SuccessResponse;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_concepts))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConceptSummary {
    id: String,
    title: String,
    objective_ids: Vec<String>,
    core_objectives: Vec<String>,
    item_count: usize,
}

async fn list_concepts(State(state): State<AppState>) -> impl IntoResponse {
    let concepts: Vec<ConceptSummary> = state
        .bank()
        .concepts()
        .map(|concept| ConceptSummary {
            id: concept.id.clone(),
            title: concept.title.clone(),
            objective_ids: concept.objective_ids(),
            core_objectives: concept.core_objectives.clone(),
            item_count: concept.items.len(),
        })
        .collect();

    Json(SuccessResponse::new(concepts))
}
