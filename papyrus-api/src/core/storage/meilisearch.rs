//! Meilisearch index for transcript search
//!
//! When configured, Meilisearch is preferred over the graph's full-text index
//! for ranking transcripts against a chat question.
//!
//! ## Indexes
//!
//! - `papyrus_transcripts`: transcript text
//!   - Searchable: text
//!   - Filterable: id

use anyhow::Result;
use meilisearch_sdk::client::Client;
use meilisearch_sdk::indexes::Index;
use meilisearch_sdk::settings::Settings;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::core::config::MeilisearchSettings;

pub const INDEX_TRANSCRIPTS: &str = "papyrus_transcripts";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub id: String,
    pub text: String,
}

#[derive(Clone)]
pub struct MeilisearchClient {
    client: Client,
}

impl MeilisearchClient {
    pub async fn new(config: &MeilisearchSettings) -> Result<Self> {
        info!("Connecting to Meilisearch at {}", config.url);

        let client = Client::new(&config.url, config.api_key.as_deref())?;
        let ms = Self { client };
        ms.init_indexes().await?;

        info!("Connected to Meilisearch successfully");
        Ok(ms)
    }

    async fn init_indexes(&self) -> Result<()> {
        self.client
            .create_index(INDEX_TRANSCRIPTS, Some("id"))
            .await
            .ok(); // Ignore if exists

        let settings = Settings::new()
            .with_searchable_attributes(["text"])
            .with_filterable_attributes(["id"]);

        self.transcripts_index().set_settings(&settings).await?;

        info!("Meilisearch indexes initialized for Papyrus");
        Ok(())
    }

    pub fn transcripts_index(&self) -> Index {
        self.client.index(INDEX_TRANSCRIPTS)
    }

    pub async fn index_transcript(&self, doc: TranscriptDocument) -> Result<()> {
        let id = doc.id.clone();
        self.transcripts_index()
            .add_documents(&[doc], Some("id"))
            .await?;
        debug!("Indexed transcript {}", id);
        Ok(())
    }

    pub async fn search_transcripts(
        &self,
        query: &str,
        ids: &[String],
        limit: usize,
    ) -> Result<Vec<TranscriptDocument>> {
        // An empty query is a placeholder search that returns every document.
        if ids.is_empty() || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let filter = id_filter(ids);
        let index = self.transcripts_index();

        let results = index
            .search()
            .with_query(query)
            .with_filter(&filter)
            .with_limit(limit)
            .execute::<TranscriptDocument>()
            .await?;

        Ok(results.hits.into_iter().map(|h| h.result).collect())
    }
}

/// `id IN ["a", "b"]`, with each id JSON-quoted.
fn id_filter(ids: &[String]) -> String {
    let quoted: Vec<String> = ids
        .iter()
        .map(|id| serde_json::Value::String(id.clone()).to_string())
        .collect();
    format!("id IN [{}]", quoted.join(", "))
}
