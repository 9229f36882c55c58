use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable transcript document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    /// Questions previously generated for this transcript.
    #[serde(default)]
    pub questions: Option<Value>,
}

impl TranscriptRecord {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            questions: None,
        }
    }

    #[cfg(test)]
    pub fn with_questions(mut self, questions: Value) -> Self {
        self.questions = Some(questions);
        self
    }
}

/// Durable project document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: String,
    /// `None` when the document lacks the field altogether.
    #[serde(default)]
    pub transcripts: Option<Vec<String>>,
}

impl ProjectRecord {
    pub fn new(id: impl Into<String>, transcripts: Vec<String>) -> Self {
        Self {
            id: id.into(),
            transcripts: Some(transcripts),
        }
    }
}

/// Transcript text held in the transcript cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTranscript {
    pub id: String,
    pub text: String,
}
