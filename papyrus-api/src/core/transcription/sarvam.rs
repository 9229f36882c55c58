use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info};

use super::SpeechToText;
use super::extract::FileKind;
use super::media::extract_audio;
use crate::core::config::TranscriptionConfig;
use crate::models::error::{ApiError, ApiResult, ErrorCode};

#[derive(Debug, Deserialize)]
struct SarvamResponse {
    #[serde(default)]
    diarized_transcript: Option<DiarizedTranscript>,
}

#[derive(Debug, Deserialize)]
struct DiarizedTranscript {
    #[serde(default)]
    entries: Vec<DiarizedEntry>,
}

#[derive(Debug, Deserialize)]
struct DiarizedEntry {
    speaker_id: Option<String>,
    #[serde(default)]
    transcript: String,
}

fn failure(detail: impl std::fmt::Display) -> ApiError {
    ApiError::extraction(
        ErrorCode::Transcription,
        format!("Failed to transcribe audio: {detail}"),
    )
}

/// `"<speaker>: <text> \n"` per diarized entry.
fn render_diarized(transcript: &DiarizedTranscript) -> String {
    transcript
        .entries
        .iter()
        .map(|entry| {
            let speaker = entry.speaker_id.as_deref().unwrap_or("Unknown Speaker");
            format!("{speaker}: {} \n", entry.transcript)
        })
        .collect()
}

/// Direct-upload speech-to-text with speaker diarization.
pub struct SarvamClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    model: String,
    ffmpeg: String,
}

impl SarvamClient {
    pub fn new(config: &TranscriptionConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()?;

        Ok(Self {
            http,
            url: config.sarvam_api_url.clone(),
            api_key: config.sarvam_api_key.clone(),
            model: config.sarvam_model.clone(),
            ffmpeg: config.ffmpeg_command.clone(),
        })
    }

    async fn upload(&self, path: &Path, kind: FileKind, language: Option<String>) -> ApiResult<String> {
        let audio = tokio::fs::read(path).await.map_err(failure)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("audio.{}", kind.extension()));

        let part = Part::bytes(audio)
            .file_name(file_name)
            .mime_str(kind.mime_type())
            .map_err(failure)?;

        let mut form = Form::new()
            .text("model", self.model.clone())
            .text("with_timesteps", "true")
            .text("with_diarization", "true")
            .part("file", part);
        if let Some(language) = language {
            form = form.text("language_code", language);
        }

        let mut request = self.http.post(&self.url).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.header("api-subscription-key", key);
        }

        let response = request.send().await.map_err(failure)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Speech-to-text returned {}: {}", status, body);
            return Err(failure(format!("{status}: {body}")));
        }

        let parsed: SarvamResponse = response.json().await.map_err(failure)?;
        let diarized = parsed.diarized_transcript.ok_or_else(|| {
            ApiError::extraction(
                ErrorCode::DiarizationMissing,
                "Diarized transcript not found in the API response.",
            )
        })?;

        info!("Transcribed {} diarized entries", diarized.entries.len());
        Ok(render_diarized(&diarized))
    }
}

#[async_trait]
impl SpeechToText for SarvamClient {
    async fn transcribe_file(
        &self,
        path: &Path,
        kind: FileKind,
        language: Option<String>,
    ) -> ApiResult<String> {
        if kind == FileKind::Mp4 {
            let audio = extract_audio(&self.ffmpeg, path).await?;
            debug!("Uploading extracted audio {:?}", audio.path());
            return self.upload(audio.path(), FileKind::Mp3, language).await;
        }

        self.upload(path, kind, language).await
    }
}
