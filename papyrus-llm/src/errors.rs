//! Error types for the completion client
//!
//! Every failure a provider call can produce is represented here so callers
//! can map them onto their own error taxonomy without string matching.

use thiserror::Error;

/// Main error type for the completion client
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure talking to the provider
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status
    #[error("Provider returned {status}: {body}")]
    Api {
        /// HTTP status code returned by the provider
        status: u16,
        /// Raw response body
        body: String,
    },

    /// The streamed response broke off or carried an error payload
    #[error("Stream error: {0}")]
    Stream(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider returned no choices or an empty message
    #[error("Provider returned an empty completion")]
    EmptyCompletion,

    /// Model output did not match the expected structured shape
    #[error("Model output is not valid structured data: {error}\nRaw output: {raw}")]
    StructuredOutput {
        /// Parse error description
        error: String,
        /// Raw model output that failed to parse
        raw: String,
    },

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, LlmError>;

impl LlmError {
    /// Create a new StructuredOutput error
    pub fn structured_output(error: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::StructuredOutput {
            error: error.into(),
            raw: raw.into(),
        }
    }

    /// Check if the error came from the provider rather than from local parsing
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Api { .. } | Self::Stream(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = LlmError::Api {
            status: 429,
            body: "rate limited".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("rate limited"));
    }

    #[test]
    fn test_structured_output_keeps_raw() {
        let err = LlmError::structured_output("expected value", "{'a': 1}");
        assert!(err.to_string().contains("{'a': 1}"));
        assert!(!err.is_provider_error());
    }

    #[test]
    fn test_is_provider_error() {
        assert!(LlmError::Stream("eof".into()).is_provider_error());
        assert!(!LlmError::EmptyCompletion.is_provider_error());
    }
}
