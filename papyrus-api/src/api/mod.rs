pub mod chat;
pub mod questions;
pub mod stats;
pub mod transcribe;

#[cfg(test)]
mod tests;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::core::state::AppState;
use crate::middleware::{error_handler, request_id};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(stats::health_check))
        .route("/stats", get(stats::get_stats))
        .route(
            "/upload-s3file-to-s3bucket/:session_id",
            post(transcribe::upload_to_bucket),
        )
        .route(
            "/transcribe-file/:transcript_id",
            post(transcribe::transcribe_file),
        )
        .route(
            "/generate-transcript-questions/:transcript_id",
            post(questions::transcript_questions),
        )
        .route(
            "/generate-questions/:project_id",
            post(questions::project_questions),
        )
        .route(
            "/get-all-answer-single-transcript-grid/:transcript_id",
            post(questions::grid_answer),
        )
        .route("/chat/:session_id", post(chat::chat))
        .with_state(state)
        .layer(middleware::from_fn(request_id::add_request_id))
        .layer(middleware::from_fn(error_handler::handle_errors))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
