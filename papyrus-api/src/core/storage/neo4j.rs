//! Neo4j storage implementation
//!
//! Records are kept as document-style nodes. Labels are prefixed with
//! "Papyrus" to avoid conflicts with other applications sharing the graph.
//!
//! ## Schema
//!
//! ```cypher
//! (:PapyrusChatSession { id: String, document: String, delete_time: String })
//! (:PapyrusTranscript  { id: String, text: String?, questions: String? })
//! (:PapyrusProject     { id: String, transcripts: [String]? })
//!
//! CREATE CONSTRAINT papyrus_session_id IF NOT EXISTS FOR (s:PapyrusChatSession) REQUIRE s.id IS UNIQUE;
//! CREATE CONSTRAINT papyrus_transcript_id IF NOT EXISTS FOR (t:PapyrusTranscript) REQUIRE t.id IS UNIQUE;
//! CREATE CONSTRAINT papyrus_project_id IF NOT EXISTS FOR (p:PapyrusProject) REQUIRE p.id IS UNIQUE;
//! CREATE FULLTEXT INDEX papyrus_transcript_text IF NOT EXISTS FOR (t:PapyrusTranscript) ON EACH [t.text];
//! ```
//!
//! Session documents are stored as serialized JSON so optional fields and
//! history survive unchanged.

use anyhow::Result;
use async_trait::async_trait;
use neo4rs::{Graph, Node, query};
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::config::Neo4jSettings;
use crate::models::records::{ProjectRecord, TranscriptRecord};
use crate::models::session::ChatSession;

use super::traits::{ChatSessionStore, ProjectStore, TranscriptStore};

pub const TRANSCRIPT_TEXT_INDEX: &str = "papyrus_transcript_text";

/// Neo4j client wrapper
#[derive(Clone)]
pub struct Neo4jClient {
    graph: Arc<Graph>,
}

impl Neo4jClient {
    pub async fn new(config: &Neo4jSettings) -> Result<Self> {
        info!("Connecting to Neo4j at {}", config.uri);

        let graph = Graph::new(&config.uri, &config.user, &config.password).await?;

        let client = Self {
            graph: Arc::new(graph),
        };
        client.init_schema().await?;

        info!("Connected to Neo4j successfully");
        Ok(client)
    }

    async fn init_schema(&self) -> Result<()> {
        let statements = [
            "CREATE CONSTRAINT papyrus_session_id IF NOT EXISTS FOR (s:PapyrusChatSession) REQUIRE s.id IS UNIQUE",
            "CREATE CONSTRAINT papyrus_transcript_id IF NOT EXISTS FOR (t:PapyrusTranscript) REQUIRE t.id IS UNIQUE",
            "CREATE CONSTRAINT papyrus_project_id IF NOT EXISTS FOR (p:PapyrusProject) REQUIRE p.id IS UNIQUE",
            "CREATE FULLTEXT INDEX papyrus_transcript_text IF NOT EXISTS FOR (t:PapyrusTranscript) ON EACH [t.text]",
        ];

        for statement in statements {
            if let Err(e) = self.graph.run(query(statement)).await {
                debug!("Schema statement result: {:?}", e);
            }
        }

        info!("Neo4j schema initialized for Papyrus");
        Ok(())
    }
}

/// Neo4j-backed implementation of every store trait.
#[derive(Clone)]
pub struct Neo4jStore {
    client: Neo4jClient,
}

impl Neo4jStore {
    pub fn new(client: Neo4jClient) -> Self {
        Self { client }
    }
}

fn transcript_from_node(node: &Node) -> Result<TranscriptRecord> {
    let id: String = node.get("id")?;
    let text: Option<String> = node.get("text").ok();
    let questions = node
        .get::<String>("questions")
        .ok()
        .map(|raw| serde_json::from_str(&raw))
        .transpose()?;

    Ok(TranscriptRecord {
        id,
        text,
        questions,
    })
}

/// Escape Lucene query syntax so user questions are searched literally.
pub(crate) fn escape_lucene(input: &str) -> String {
    const SPECIAL: &[char] = &[
        '+', '-', '&', '|', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':',
        '\\', '/',
    ];

    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if SPECIAL.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Lucene query for a free-text question, or `None` when there is nothing to
/// search for. Lowercasing keeps bare `AND`/`OR`/`NOT` from parsing as operators.
pub(crate) fn fulltext_query(question: &str) -> Option<String> {
    let question = question.trim();
    if question.is_empty() {
        return None;
    }
    Some(escape_lucene(&question.to_lowercase()))
}

#[async_trait]
impl ChatSessionStore for Neo4jStore {
    async fn find_session(&self, id: &str) -> Result<Option<ChatSession>> {
        let q = query("MATCH (s:PapyrusChatSession {id: $id}) RETURN s.document AS document")
            .param("id", id);

        let mut result = self.client.graph.execute(q).await?;

        if let Some(row) = result.next().await? {
            let document: String = row.get("document")?;
            return Ok(Some(serde_json::from_str(&document)?));
        }

        Ok(None)
    }

    async fn upsert_session(&self, session: &ChatSession) -> Result<()> {
        let document = serde_json::to_string(session)?;

        let q = query(
            "MERGE (s:PapyrusChatSession {id: $id})
            SET s.document = $document,
                s.delete_time = $delete_time",
        )
        .param("id", session.id.clone())
        .param("document", document)
        .param("delete_time", session.delete_time.to_rfc3339());

        self.client.graph.run(q).await?;
        debug!("Upserted Neo4j session {}", session.id);
        Ok(())
    }
}

#[async_trait]
impl TranscriptStore for Neo4jStore {
    async fn find_transcript(&self, id: &str) -> Result<Option<TranscriptRecord>> {
        let q = query("MATCH (t:PapyrusTranscript {id: $id}) RETURN t").param("id", id);

        let mut result = self.client.graph.execute(q).await?;

        if let Some(row) = result.next().await? {
            let node: Node = row.get("t")?;
            return Ok(Some(transcript_from_node(&node)?));
        }

        Ok(None)
    }

    async fn search_transcripts(
        &self,
        query_text: &str,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<TranscriptRecord>> {
        let Some(lucene) = fulltext_query(query_text) else {
            debug!("Blank search query, no transcripts matched");
            return Ok(Vec::new());
        };
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let q = query(
            "CALL db.index.fulltext.queryNodes($index, $query) YIELD node, score
            WHERE node.id IN $ids
            RETURN node
            ORDER BY score DESC
            LIMIT $limit",
        )
        .param("index", TRANSCRIPT_TEXT_INDEX)
        .param("query", lucene)
        .param("ids", ids.to_vec())
        .param("limit", limit as i64);

        let mut result = self.client.graph.execute(q).await?;
        let mut records = Vec::new();

        while let Some(row) = result.next().await? {
            let node: Node = row.get("node")?;
            records.push(transcript_from_node(&node)?);
        }

        debug!("Neo4j full-text search returned {} transcripts", records.len());
        Ok(records)
    }

    async fn save_transcript_text(&self, id: &str, text: &str) -> Result<()> {
        let q = query("MERGE (t:PapyrusTranscript {id: $id}) SET t.text = $text")
            .param("id", id)
            .param("text", text);

        self.client.graph.run(q).await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for Neo4jStore {
    async fn find_project(&self, id: &str) -> Result<Option<ProjectRecord>> {
        let q = query("MATCH (p:PapyrusProject {id: $id}) RETURN p").param("id", id);

        let mut result = self.client.graph.execute(q).await?;

        if let Some(row) = result.next().await? {
            let node: Node = row.get("p")?;
            return Ok(Some(ProjectRecord {
                id: id.to_string(),
                transcripts: node.get::<Vec<String>>("transcripts").ok(),
            }));
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn test_escape_lucene() {
        assert_eq!(escape_lucene("what is (this)?"), "what is \\(this\\)\\?");
        assert_eq!(escape_lucene("plain words"), "plain words");
    }

    #[test]
    fn test_fulltext_query_blank_and_operators() {
        assert_eq!(fulltext_query(""), None);
        assert_eq!(fulltext_query("  \t\n "), None);
        assert_eq!(
            fulltext_query(" Pricing AND (onboarding)? "),
            Some("pricing and \\(onboarding\\)\\?".to_string())
        );
    }

    // Integration tests require a running Neo4j instance
    // Run with: cargo test -- --ignored

    fn settings() -> Neo4jSettings {
        Neo4jSettings {
            uri: std::env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://localhost:7687".to_string()),
            user: std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string()),
            password: std::env::var("NEO4J_PASSWORD").unwrap_or_else(|_| "password".to_string()),
        }
    }

    #[tokio::test]
    #[ignore]
    async fn test_neo4j_session_round_trip() {
        let store = Neo4jStore::new(Neo4jClient::new(&settings()).await.unwrap());

        let session = ChatSession::for_transcript("neo4j-test-session", "T1", Utc::now() + Duration::minutes(30));
        store.upsert_session(&session).await.unwrap();

        let loaded = store.find_session("neo4j-test-session").await.unwrap().unwrap();
        assert_eq!(loaded.transcript_id.as_deref(), Some("T1"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_neo4j_transcript_search() {
        let store = Neo4jStore::new(Neo4jClient::new(&settings()).await.unwrap());

        store
            .save_transcript_text("neo4j-test-transcript", "the pricing page confuses people")
            .await
            .unwrap();

        let results = store
            .search_transcripts("pricing", &["neo4j-test-transcript".to_string()], 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }
}
