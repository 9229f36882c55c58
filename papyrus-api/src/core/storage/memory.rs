//! In-memory storage implementation
//!
//! Backs the default configuration and every endpoint test. Data is lost
//! when the process exits.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use crate::models::records::{ProjectRecord, TranscriptRecord};
use crate::models::session::ChatSession;

use super::traits::{ChatSessionStore, ProjectStore, TranscriptStore};

#[derive(Default)]
pub struct InMemoryStore {
    sessions: DashMap<String, ChatSession>,
    transcripts: DashMap<String, TranscriptRecord>,
    projects: DashMap<String, ProjectRecord>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn insert_session(&self, session: ChatSession) {
        self.sessions.insert(session.id.clone(), session);
    }

    #[cfg(test)]
    pub fn insert_transcript(&self, transcript: TranscriptRecord) {
        self.transcripts.insert(transcript.id.clone(), transcript);
    }

    #[cfg(test)]
    pub fn insert_project(&self, project: ProjectRecord) {
        self.projects.insert(project.id.clone(), project);
    }

    pub fn session(&self, id: &str) -> Option<ChatSession> {
        self.sessions.get(id).map(|s| s.clone())
    }

    pub fn transcript(&self, id: &str) -> Option<TranscriptRecord> {
        self.transcripts.get(id).map(|t| t.clone())
    }
}

/// Number of query-term occurrences in `text`, case-insensitive.
fn relevance(terms: &[String], text: &str) -> usize {
    let text = text.to_lowercase();
    terms
        .iter()
        .map(|term| text.matches(term.as_str()).count())
        .sum()
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl ChatSessionStore for InMemoryStore {
    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>> {
        Ok(self.session(id))
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<()> {
        self.sessions.insert(session.id.clone(), session.clone());
        debug!("Upserted session {}", session.id);
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for InMemoryStore {
    async fn find_transcript(&self, id: &str) -> Result<Option<TranscriptRecord>> {
        Ok(self.transcript(id))
    }

    async fn search_transcripts(
        &self,
        query: &str,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>> {
        let terms = query_terms(query);

        let mut scored: Vec<(usize, usize, TranscriptRecord)> = ids
            .iter()
            .enumerate()
            .filter_map(|(position, id)| {
                let record = self.transcript(id)?;
                let score = relevance(&terms, record.text.as_deref()?);
                (score > 0).then_some((score, position, record))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(_, _, record)| record)
            .collect())
    }

    async fn save_transcript_text(&self, id: &str, text: &str) -> Result<()> {
        self.transcripts
            .entry(id.to_string())
            .and_modify(|t| t.text = Some(text.to_string()))
            .or_insert_with(|| TranscriptRecord::new(id, text));
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for InMemoryStore {
    async fn find_project(&self, id: &str) -> Result<Option<ProjectRecord>> {
        Ok(self.projects.get(id).map(|p| p.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.insert_transcript(TranscriptRecord::new("T1", "We talked about pricing and churn."));
        store.insert_transcript(TranscriptRecord::new(
            "T2",
            "Pricing, pricing, pricing. The pricing page confuses people.",
        ));
        store.insert_transcript(TranscriptRecord::new("T3", "Onboarding was smooth."));
        store.insert_transcript(TranscriptRecord {
            id: "T4".to_string(),
            text: None,
            questions: None,
        });
        store
    }

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_search_ranks_by_relevance() {
        let store = store();
        let results = store
            .search_transcripts("What about pricing?", &ids(&["T1", "T2", "T3", "T4"]), 3)
            .await
            .unwrap();

        let found: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(found, vec!["T2", "T1"]);
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_ids() {
        let store = store();
        let results = store
            .search_transcripts("pricing", &ids(&["T1", "T3"]), 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "T1");
    }

    #[tokio::test]
    async fn test_search_respects_limit_and_misses() {
        let store = store();
        let limited = store
            .search_transcripts("pricing", &ids(&["T1", "T2"]), 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);

        let none = store
            .search_transcripts("kubernetes", &ids(&["T1", "T2", "T3"]), 3)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_search_blank_question_matches_nothing() {
        let store = store();
        for blank in ["", "   ", "?!"] {
            let results = store
                .search_transcripts(blank, &ids(&["T1", "T2", "T3"]), 3)
                .await
                .unwrap();
            assert!(results.is_empty(), "{blank:?} matched {results:?}");
        }
    }

    #[tokio::test]
    async fn test_save_transcript_text_keeps_questions() {
        let store = store();
        store.insert_transcript(
            TranscriptRecord::new("T5", "old").with_questions(serde_json::json!(["q1"])),
        );

        store.save_transcript_text("T5", "new").await.unwrap();
        store.save_transcript_text("T6", "created").await.unwrap();

        let t5 = store.transcript("T5").unwrap();
        assert_eq!(t5.text.as_deref(), Some("new"));
        assert!(t5.questions.is_some());
        assert_eq!(store.transcript("T6").unwrap().text.as_deref(), Some("created"));
    }
}
