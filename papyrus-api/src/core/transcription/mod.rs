//! Text extraction and speech-to-text
//!
//! - `extract`: PDF, DOCX and TXT documents
//! - `media`: audio demuxing with ffmpeg
//! - `aws`: AWS Transcribe batch jobs on a media URL
//! - `sarvam`: direct-upload transcription with diarization

pub mod aws;
pub mod extract;
pub mod media;
pub mod sarvam;

use async_trait::async_trait;
use std::path::Path;

use crate::models::error::ApiResult;

pub use aws::AwsTranscriber;
pub use extract::{ALLOWED_EXTENSIONS, FileKind};
pub use sarvam::SarvamClient;

/// A media file to transcribe in place, by URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaJob {
    pub url: String,
    pub kind: FileKind,
    pub language: Option<String>,
    pub max_speakers: i32,
}

/// Submit-and-poll transcription of a remote media file.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionJobs: Send + Sync {
    async fn transcribe(&self, job: &MediaJob) -> ApiResult<String>;
}

/// Transcription of a local media file uploaded directly to the provider.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe_file(
        &self,
        path: &Path,
        kind: FileKind,
        language: Option<String>,
    ) -> ApiResult<String>;
}
