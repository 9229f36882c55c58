use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::core::cache::RecordCache;
use crate::core::object_store::{ObjectStore, parse_s3_url};
use crate::core::storage::TranscriptStore;
use crate::core::transcription::{
    ALLOWED_EXTENSIONS, FileKind, MediaJob, SpeechToText, TranscriptionJobs,
    extract::extract_document,
};
use crate::models::error::{ApiError, ApiResult, ErrorCode};
use crate::models::records::CachedTranscript;
use crate::models::requests::{S3UploadRequest, TranscribeMethod, TranscribeRequest};

const UPLOAD_MEDIA: &[&str] = &["mp3", "mp4", "wav"];

fn download_failure(detail: impl std::fmt::Display) -> ApiError {
    ApiError::transcription(
        ErrorCode::Download,
        format!("Couldn't download file from S3 link: {detail}"),
    )
}

/// Turns uploaded documents and recordings into transcript text.
pub struct IngestService {
    objects: Arc<dyn ObjectStore>,
    jobs: Arc<dyn TranscriptionJobs>,
    speech: Arc<dyn SpeechToText>,
    transcripts: Arc<dyn TranscriptStore>,
    transcript_cache: RecordCache<CachedTranscript>,
    bucket: String,
}

impl IngestService {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        jobs: Arc<dyn TranscriptionJobs>,
        speech: Arc<dyn SpeechToText>,
        transcripts: Arc<dyn TranscriptStore>,
        transcript_cache: RecordCache<CachedTranscript>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            objects,
            jobs,
            speech,
            transcripts,
            transcript_cache,
            bucket: bucket.into(),
        }
    }

    /// Extract or transcribe the file at `request.url`, then store the text
    /// on the transcript.
    pub async fn transcribe(
        &self,
        transcript_id: &str,
        request: &TranscribeRequest,
    ) -> ApiResult<String> {
        let kind = FileKind::from_url(&request.url).ok_or_else(|| {
            ApiError::extraction(
                ErrorCode::UnsupportedFileType,
                format!(
                    "Unsupported file type. Allowed types: {}",
                    ALLOWED_EXTENSIONS.join(", ")
                ),
            )
        })?;

        let text = if kind.is_media() && request.transcribe_method == TranscribeMethod::Aws {
            let job = MediaJob {
                url: request.url.clone(),
                kind,
                language: request.transcribe_lang.clone(),
                max_speakers: request.transcribe_speaker_number,
            };
            self.jobs.transcribe(&job).await?
        } else {
            let file = self.download(&request.url, kind).await?;
            if kind.is_media() {
                self.speech
                    .transcribe_file(file.path(), kind, request.transcribe_lang.clone())
                    .await?
            } else {
                let path = file.path().to_path_buf();
                tokio::task::spawn_blocking(move || extract_document(kind, &path))
                    .await
                    .map_err(|e| ApiError::Internal(format!("Extraction task failed: {e}")))??
            }
        };

        info!(
            "Transcript {} produced {} characters from {}",
            transcript_id,
            text.len(),
            kind.extension()
        );

        if let Err(e) = self.transcripts.save_transcript_text(transcript_id, &text).await {
            warn!("Failed to save text for transcript {}: {}", transcript_id, e);
        }
        self.transcript_cache.evict(transcript_id);

        Ok(text)
    }

    /// Download `s3://bucket/key` to a temporary file with the right suffix.
    async fn download(&self, url: &str, kind: FileKind) -> ApiResult<NamedTempFile> {
        let (bucket, key) = parse_s3_url(url)?;
        let body = self
            .objects
            .get_object(&bucket, &key)
            .await
            .map_err(download_failure)?;

        let mut file = tempfile::Builder::new()
            .prefix("papyrus_")
            .suffix(&format!(".{}", kind.extension()))
            .tempfile()
            .map_err(download_failure)?;
        file.write_all(&body).map_err(download_failure)?;
        file.flush().map_err(download_failure)?;

        Ok(file)
    }

    /// Copy a recording from a presigned URL into the upload bucket.
    pub async fn upload(&self, session_id: &str, request: &S3UploadRequest) -> ApiResult<String> {
        let source_path = request.bot_url.split('?').next().unwrap_or_default();
        let extension = source_path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let target_has_extension = std::path::Path::new(&request.s3_file_path)
            .extension()
            .is_some();

        if !target_has_extension || !UPLOAD_MEDIA.contains(&extension.as_str()) {
            return Err(ApiError::extraction(
                ErrorCode::UnsupportedFileType,
                "Unsupported file type or s3 save path is not a file path",
            ));
        }

        let body = self.objects.fetch_url(&request.bot_url).await.map_err(|e| {
            ApiError::transcription(
                ErrorCode::Download,
                format!("Failed to download file from presigned URL: {e}"),
            )
        })?;

        self.objects
            .put_object(&self.bucket, &request.s3_file_path, body)
            .await
            .map_err(|e| {
                ApiError::transcription(
                    ErrorCode::Download,
                    format!("Error processing bot url to s3 with message: {e}"),
                )
            })?;

        let location = format!("s3://{}/{}", self.bucket, request.s3_file_path);
        info!("Session {} uploaded recording to {}", session_id, location);
        Ok(location)
    }
}
