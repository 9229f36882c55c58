use chrono::{Duration, Utc};
use papyrus_llm::Message;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::core::cache::RecordCache;
use crate::core::storage::{ProjectStore, TranscriptStore};
use crate::models::error::{ApiError, ApiResult, ErrorCode};
use crate::models::records::CachedTranscript;
use crate::models::session::{ChatSession, ChatType};

/// Decides when a chat turn gets grounding context and fetches it.
#[derive(Clone)]
pub struct ContextAssembler {
    transcripts: Arc<dyn TranscriptStore>,
    projects: Arc<dyn ProjectStore>,
    cache: RecordCache<CachedTranscript>,
    context_repeat: u64,
    transcript_ttl: Duration,
}

impl ContextAssembler {
    pub fn new(
        transcripts: Arc<dyn TranscriptStore>,
        projects: Arc<dyn ProjectStore>,
        cache: RecordCache<CachedTranscript>,
        context_repeat: u64,
        transcript_ttl: Duration,
    ) -> Self {
        Self {
            transcripts,
            projects,
            cache,
            context_repeat,
            transcript_ttl,
        }
    }

    pub fn cache(&self) -> &RecordCache<CachedTranscript> {
        &self.cache
    }

    /// Context is fetched on interaction counts 0, k, 2k, ...
    pub fn should_refresh(&self, num_interactions: u64) -> bool {
        num_interactions % self.context_repeat == 0
    }

    /// Text of one transcript, through the transcript cache.
    pub async fn transcript_text(&self, transcript_id: &str) -> ApiResult<String> {
        if let Some(cached) = self.cache.get(transcript_id) {
            debug!("Transcript {} served from cache", transcript_id);
            return Ok(cached.text);
        }

        let record = self
            .transcripts
            .find_transcript(transcript_id)
            .await
            .map_err(|e| {
                error!("Failed to load transcript {}: {}", transcript_id, e);
                ApiError::Internal(format!("Failed to load transcript {transcript_id}"))
            })?
            .ok_or_else(|| {
                ApiError::not_found(
                    ErrorCode::TranscriptNotFound,
                    format!("Cannot find Transcript ID: {transcript_id}"),
                )
            })?;

        // Only a missing text field is an error; an empty one is served as is.
        let text = record.text.ok_or_else(|| {
            ApiError::not_found(ErrorCode::TranscriptEmpty, "Transcript text is empty")
        })?;

        self.cache.put(
            transcript_id,
            CachedTranscript {
                id: transcript_id.to_string(),
                text: text.clone(),
            },
            Utc::now() + self.transcript_ttl,
        );

        Ok(text)
    }

    /// Project record with its transcript list, 700/701 otherwise.
    pub async fn project_transcripts(&self, project_id: &str) -> ApiResult<Vec<String>> {
        let project = self
            .projects
            .find_project(project_id)
            .await
            .map_err(|e| {
                error!("Failed to load project {}: {}", project_id, e);
                ApiError::Internal(format!("Failed to load project {project_id}"))
            })?
            .ok_or_else(|| {
                ApiError::not_found(
                    ErrorCode::ProjectNotFound,
                    format!("Cannot find project ID: {project_id}"),
                )
            })?;

        project.transcripts.ok_or_else(|| {
            ApiError::not_found(
                ErrorCode::ProjectTranscriptsMissing,
                "No transcripts found for the project",
            )
        })
    }

    /// Top `top_n` project transcripts ranked against `question`, as
    /// `Transcript: <text>` blocks separated by a blank line. Empty when
    /// nothing matches.
    pub async fn project_context(
        &self,
        project_id: &str,
        question: &str,
        top_n: usize,
    ) -> ApiResult<String> {
        let ids = self.project_transcripts(project_id).await?;

        let ranked = self
            .transcripts
            .search_transcripts(question, &ids, top_n)
            .await
            .map_err(|e| {
                error!("Transcript search failed for project {}: {}", project_id, e);
                ApiError::not_found(
                    ErrorCode::TranscriptLookup,
                    format!("Error finding transcripts for project {project_id}: {e}"),
                )
            })?;

        let blocks: Vec<String> = ranked
            .into_iter()
            .filter_map(|record| record.text)
            .map(|text| format!("Transcript: {text}"))
            .collect();

        if blocks.is_empty() {
            warn!(
                "No transcripts in project {} matched the question; continuing without context",
                project_id
            );
        }

        Ok(blocks.join("\n\n"))
    }

    /// The system context message for this turn, if one is due and non-empty.
    pub async fn assemble(
        &self,
        session: &ChatSession,
        question: &str,
        top_n: usize,
    ) -> ApiResult<Option<Message>> {
        if !self.should_refresh(session.num_interactions) {
            return Ok(None);
        }

        let context = match session.chat_type {
            ChatType::Transcript => {
                let transcript_id = session.transcript_id.as_deref().ok_or_else(|| {
                    ApiError::not_found(
                        ErrorCode::TranscriptNotFound,
                        format!("Cannot find Transcript ID for session {}", session.id),
                    )
                })?;
                format!("Transcript: {}", self.transcript_text(transcript_id).await?)
            },
            ChatType::Project => {
                let project_id = session.project_id.as_deref().ok_or_else(|| {
                    ApiError::not_found(
                        ErrorCode::ProjectNotFound,
                        format!("Cannot find project ID for session {}", session.id),
                    )
                })?;
                self.project_context(project_id, question, top_n).await?
            },
        };

        if context.is_empty() {
            return Ok(None);
        }

        debug!(
            "Assembled {} bytes of context for session {}",
            context.len(),
            session.id
        );
        Ok(Some(Message::system(format!("Context: {context}"))))
    }
}
