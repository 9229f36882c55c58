use std::path::Path;
use std::process::Stdio;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, error};

use crate::models::error::{ApiError, ApiResult, ErrorCode};

fn failure(detail: impl std::fmt::Display) -> ApiError {
    ApiError::extraction(
        ErrorCode::AudioExtraction,
        format!("Failed to extract audio from video: {detail}"),
    )
}

/// Demux the audio track of `video` into a temporary mp3 file.
pub async fn extract_audio(ffmpeg: &str, video: &Path) -> ApiResult<NamedTempFile> {
    let output = tempfile::Builder::new()
        .prefix("extracted_audio_")
        .suffix(".mp3")
        .tempfile()
        .map_err(failure)?;

    debug!("Extracting audio from {:?} to {:?}", video, output.path());

    let result = Command::new(ffmpeg)
        .arg("-y")
        .arg("-i")
        .arg(video)
        .arg("-vn")
        .arg(output.path())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(failure)?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        let tail: String = stderr.lines().rev().take(5).collect::<Vec<_>>().join(" | ");
        error!("ffmpeg exited with {}: {}", result.status, tail);
        return Err(failure(format!("ffmpeg exited with {}", result.status)));
    }

    Ok(output)
}
