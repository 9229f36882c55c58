use async_trait::async_trait;
use aws_sdk_transcribe::error::DisplayErrorContext;
use aws_sdk_transcribe::types::{
    LanguageCode, Media, MediaFormat, Settings, TranscriptionJobStatus,
};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{MediaJob, TranscriptionJobs};
use crate::models::error::{ApiError, ApiResult, ErrorCode};

#[derive(Debug, Deserialize)]
struct TranscriptDocument {
    results: TranscriptResults,
}

#[derive(Debug, Deserialize)]
struct TranscriptResults {
    #[serde(default)]
    audio_segments: Vec<AudioSegment>,
}

#[derive(Debug, Deserialize)]
struct AudioSegment {
    speaker_label: Option<String>,
    #[serde(default)]
    transcript: String,
}

/// `"<speaker>: <text>\n"` for each segment that carries a speaker label.
fn render_segments(document: &TranscriptDocument) -> String {
    document
        .results
        .audio_segments
        .iter()
        .filter_map(|segment| {
            segment
                .speaker_label
                .as_ref()
                .map(|speaker| format!("{speaker}: {}\n", segment.transcript))
        })
        .collect()
}

fn http_failure(detail: impl std::fmt::Display) -> ApiError {
    ApiError::transcription(
        ErrorCode::TranscriptionHttp,
        format!("HTTP error occurred: {detail}"),
    )
}

/// Batch transcription through AWS Transcribe: submit a job on the media
/// URL, then poll it at a fixed interval until it completes or fails.
pub struct AwsTranscriber {
    client: aws_sdk_transcribe::Client,
    http: reqwest::Client,
    poll_interval: Duration,
}

impl AwsTranscriber {
    pub fn new(client: aws_sdk_transcribe::Client, poll_interval: Duration) -> Self {
        Self {
            client,
            http: reqwest::Client::new(),
            poll_interval,
        }
    }

    async fn start(&self, job_name: &str, job: &MediaJob) -> ApiResult<()> {
        let settings = Settings::builder()
            .show_speaker_labels(true)
            .max_speaker_labels(job.max_speakers)
            .build();

        let mut request = self
            .client
            .start_transcription_job()
            .transcription_job_name(job_name)
            .media(Media::builder().media_file_uri(&job.url).build())
            .media_format(MediaFormat::from(job.kind.extension()))
            .settings(settings);

        request = match &job.language {
            Some(language) => request.language_code(LanguageCode::from(language.as_str())),
            None => request.identify_language(true),
        };

        request.send().await.map_err(|e| {
            ApiError::transcription(
                ErrorCode::TranscriptionJobStart,
                format!(
                    "Failed to start transcription job: {}",
                    DisplayErrorContext(&e)
                ),
            )
        })?;

        info!("Started transcription job {}", job_name);
        Ok(())
    }

    async fn fetch_transcript(&self, uri: &str) -> ApiResult<String> {
        let document: TranscriptDocument = self
            .http
            .get(uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(http_failure)?
            .json()
            .await
            .map_err(http_failure)?;

        Ok(render_segments(&document))
    }
}

#[async_trait]
impl TranscriptionJobs for AwsTranscriber {
    async fn transcribe(&self, job: &MediaJob) -> ApiResult<String> {
        let job_name = format!("transcription-job-{}", Uuid::new_v4());
        self.start(&job_name, job).await?;

        loop {
            let status = self
                .client
                .get_transcription_job()
                .transcription_job_name(&job_name)
                .send()
                .await
                .map_err(|e| http_failure(DisplayErrorContext(&e)))?;

            let Some(transcription) = status.transcription_job() else {
                return Err(http_failure("job status missing from response"));
            };

            match transcription.transcription_job_status() {
                Some(TranscriptionJobStatus::Completed) => {
                    let uri = transcription
                        .transcript()
                        .and_then(|t| t.transcript_file_uri())
                        .ok_or_else(|| http_failure("completed job has no transcript URI"))?;
                    info!("Transcription job {} completed", job_name);
                    return self.fetch_transcript(uri).await;
                },
                Some(TranscriptionJobStatus::Failed) => {
                    warn!(
                        "Transcription job {} failed: {}",
                        job_name,
                        transcription.failure_reason().unwrap_or("unknown reason")
                    );
                    return Err(ApiError::transcription(
                        ErrorCode::TranscriptionJobFailed,
                        "Transcription job failed.",
                    ));
                },
                other => {
                    debug!("Transcription job {} status: {:?}", job_name, other);
                    tokio::time::sleep(self.poll_interval).await;
                },
            }
        }
    }
}
