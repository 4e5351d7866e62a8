use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::response::{AppError, SuccessResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_attempt))
        .route("/:attemptId", get(get_attempt))
        .route("/:attemptId/answers", post(submit_answer))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartAttemptRequest {
    learner_id: String,
    concept_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitAnswerRequest {
    item_id: String,
    selected_index: i64,
}

async fn start_attempt(
    State(state): State<AppState>,
    Json(payload): Json<StartAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let view = state
        .orchestrator()
        .start_attempt(&payload.learner_id, &payload.concept_id)
        .await?;

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(view))))
}

async fn get_attempt(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let view = state.orchestrator().current(&attempt_id).await?;
    Ok(Json(SuccessResponse::new(view)))
}

async fn submit_answer(
    State(state): State<AppState>,
    Path(attempt_id): Path<String>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.item_id.trim().is_empty() {
        return Err(AppError::validation("itemId is required"));
    }

    let outcome = state
        .orchestrator()
        .submit_answer(&attempt_id, &payload.item_id, payload.selected_index)
        .await?;

    Ok(Json(SuccessResponse::new(outcome)))
}
