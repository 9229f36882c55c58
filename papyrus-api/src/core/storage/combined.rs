//! Combined Neo4j + Meilisearch storage
//!
//! Neo4j holds every record. When Meilisearch is configured, saved transcript
//! text is also indexed there and transcript search goes to Meilisearch
//! first, falling back to the graph's full-text index on error.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::records::{ProjectRecord, TranscriptRecord};
use crate::models::session::ChatSession;

use super::meilisearch::{MeilisearchClient, TranscriptDocument};
use super::neo4j::{Neo4jClient, Neo4jStore};
use super::traits::{ChatSessionStore, ProjectStore, TranscriptStore};

pub struct CombinedStore {
    neo4j: Neo4jStore,
    meilisearch: Option<Arc<MeilisearchClient>>,
}

impl CombinedStore {
    pub fn new(neo4j_client: Neo4jClient, meilisearch: Option<Arc<MeilisearchClient>>) -> Self {
        Self {
            neo4j: Neo4jStore::new(neo4j_client),
            meilisearch,
        }
    }

    async fn search_index(
        &self,
        ms: &MeilisearchClient,
        query: &str,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>> {
        let hits = ms.search_transcripts(query, ids, limit).await?;

        // Questions live in the graph; keep the ranking from the index.
        let mut records = Vec::with_capacity(hits.len());
        for hit in hits {
            let record = match self.neo4j.find_transcript(&hit.id).await? {
                Some(record) => record,
                None => TranscriptRecord::new(hit.id, hit.text),
            };
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl ChatSessionStore for CombinedStore {
    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>> {
        self.neo4j.find_session(id).await
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<()> {
        self.neo4j.upsert_session(session).await
    }
}

#[async_trait]
impl TranscriptStore for CombinedStore {
    async fn find_transcript(&self, id: &str) -> Result<Option<TranscriptRecord>> {
        self.neo4j.find_transcript(id).await
    }

    async fn search_transcripts(
        &self,
        query: &str,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>> {
        if let Some(ms) = &self.meilisearch {
            match self.search_index(ms, query, ids, limit).await {
                Ok(records) => {
                    debug!("Meilisearch returned {} transcripts", records.len());
                    return Ok(records);
                },
                Err(e) => warn!("Meilisearch search failed, using Neo4j index: {}", e),
            }
        }

        self.neo4j.search_transcripts(query, ids, limit).await
    }

    async fn save_transcript_text(&self, id: &str, text: &str) -> Result<()> {
        self.neo4j.save_transcript_text(id, text).await?;

        if let Some(ms) = &self.meilisearch {
            let doc = TranscriptDocument {
                id: id.to_string(),
                text: text.to_string(),
            };
            if let Err(e) = ms.index_transcript(doc).await {
                warn!("Failed to index transcript {} in Meilisearch: {}", id, e);
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ProjectStore for CombinedStore {
    async fn find_project(&self, id: &str) -> Result<Option<ProjectRecord>> {
        self.neo4j.find_project(id).await
    }
}

