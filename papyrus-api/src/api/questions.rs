use axum::{
    Json,
    extract::{Path, State},
};
use serde_json::{Value, json};

use crate::core::state::AppState;
use crate::models::{
    error::ApiResult,
    requests::{GenerateQuestionsRequest, GridQuestionRequest},
};

pub async fn transcript_questions(
    State(state): State<AppState>,
    Path(transcript_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let questions = state.generator.transcript_questions(&transcript_id).await?;
    Ok(Json(json!({ "questions": questions })))
}

pub async fn project_questions(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(request): Json<GenerateQuestionsRequest>,
) -> ApiResult<Json<Value>> {
    let questions = state
        .generator
        .project_questions(&project_id, request.num_q)
        .await?;
    Ok(Json(questions))
}

pub async fn grid_answer(
    State(state): State<AppState>,
    Path(transcript_id): Path<String>,
    Json(request): Json<GridQuestionRequest>,
) -> ApiResult<Json<Value>> {
    let answer = state
        .generator
        .grid_answer(&transcript_id, &request.question)
        .await?;
    Ok(Json(answer))
}
