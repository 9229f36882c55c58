use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

/// Numbered failure codes callers rely on.
///
/// The hundreds digit groups them by concern: 3xx extraction and
/// transcription, 4xx LLM generation, 6xx transcription jobs and downloads,
/// 7xx missing records. The code doubles as the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    PdfExtraction = 300,
    DocxExtraction = 301,
    TxtRead = 302,
    AudioExtraction = 303,
    DiarizationMissing = 304,
    Transcription = 305,
    UnsupportedFileType = 306,

    QuestionGeneration = 400,
    AnswerGeneration = 401,
    ChatGeneration = 402,
    ChatStream = 403,

    Download = 600,
    TranscriptionJobStart = 601,
    TranscriptionJobFailed = 602,
    TranscriptionHttp = 603,

    ProjectNotFound = 700,
    ProjectTranscriptsMissing = 701,
    TranscriptLookup = 702,
    TranscriptProcessing = 703,
    NoValidContent = 704,
    TranscriptNotFound = 705,
    TranscriptEmpty = 706,
    SessionNotFound = 707,
}

impl ErrorCode {
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn category(self) -> &'static str {
        match self.as_u16() {
            300..=399 => "extraction_error",
            400..=499 => "generation_error",
            600..=699 => "transcription_error",
            _ => "not_found_error",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{detail}")]
    Extraction { code: ErrorCode, detail: String },

    #[error("{detail}")]
    Generation { code: ErrorCode, detail: String },

    #[error("{detail}")]
    Transcription { code: ErrorCode, detail: String },

    #[error("{detail}")]
    NotFound { code: ErrorCode, detail: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn extraction(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Extraction {
            code,
            detail: detail.into(),
        }
    }

    pub fn generation(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Generation {
            code,
            detail: detail.into(),
        }
    }

    pub fn transcription(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::Transcription {
            code,
            detail: detail.into(),
        }
    }

    pub fn not_found(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self::NotFound {
            code,
            detail: detail.into(),
        }
    }

    /// The numbered code, if this error carries one.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            ApiError::Extraction { code, .. }
            | ApiError::Generation { code, .. }
            | ApiError::Transcription { code, .. }
            | ApiError::NotFound { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            coded => coded
                .code()
                .and_then(|c| StatusCode::from_u16(c.as_u16()).ok())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
    pub code: u16,
    pub r#type: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = match &self {
            ApiError::Internal(_) => "internal_error",
            coded => coded.code().map(ErrorCode::category).unwrap_or("internal_error"),
        };

        let body = ErrorResponse {
            detail: self.to_string(),
            code: status.as_u16(),
            r#type: error_type.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
