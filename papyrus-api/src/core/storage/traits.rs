//! Storage trait definitions
//!
//! The service only needs a narrow slice of a document database: load and
//! upsert chat sessions, load transcripts and projects, and run a ranked
//! full-text search over a fixed set of transcripts.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::records::{ProjectRecord, TranscriptRecord};
use crate::models::session::ChatSession;

#[async_trait]
pub trait ChatSessionStore: Send + Sync {
    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>>;

    /// Insert or fully replace the stored session.
    async fn upsert_session(&self, session: &ChatSession) -> Result<()>;
}

#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn find_transcript(&self, id: &str) -> Result<Option<TranscriptRecord>>;

    /// Ranked full-text search over the transcripts in `ids`, best match
    /// first, at most `limit` results.
    async fn search_transcripts(
        &self,
        query: &str,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>>;

    /// Store extracted text on the transcript, creating it if needed.
    async fn save_transcript_text(&self, id: &str, text: &str) -> Result<()>;
}

#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn find_project(&self, id: &str) -> Result<Option<ProjectRecord>>;
}
