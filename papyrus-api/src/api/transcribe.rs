use axum::{
    Json,
    extract::{Path, State},
};
use tracing::info;

use crate::core::state::AppState;
use crate::models::{
    error::ApiResult,
    requests::{S3UploadRequest, TranscribeRequest, TranscribeResponse},
};

pub async fn transcribe_file(
    State(state): State<AppState>,
    Path(transcript_id): Path<String>,
    Json(request): Json<TranscribeRequest>,
) -> ApiResult<Json<TranscribeResponse>> {
    info!(
        "Transcribing {} for transcript {} via {:?}",
        request.url, transcript_id, request.transcribe_method
    );
    let transcript = state.ingest.transcribe(&transcript_id, &request).await?;
    Ok(Json(TranscribeResponse { transcript }))
}

/// Copies a meeting-bot recording into the upload bucket.
pub async fn upload_to_bucket(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<S3UploadRequest>,
) -> ApiResult<Json<String>> {
    let location = state.ingest.upload(&session_id, &request).await?;
    Ok(Json(location))
}
