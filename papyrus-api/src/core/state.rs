use chrono::Duration;
use papyrus_llm::CompletionProvider;
use std::sync::Arc;

use crate::core::cache::{CacheStats, RecordCache, Sweep};
use crate::core::config::Settings;
use crate::core::context::ContextAssembler;
use crate::core::generation::Generator;
use crate::core::ingest::IngestService;
use crate::core::object_store::ObjectStore;
use crate::core::session_manager::{SessionConfig, SessionManager};
use crate::core::storage::{ChatSessionStore, ProjectStore, TranscriptStore};
use crate::core::transcription::{SpeechToText, TranscriptionJobs};

/// Durable stores, one handle per concern.
#[derive(Clone)]
pub struct Stores {
    pub sessions: Arc<dyn ChatSessionStore>,
    pub transcripts: Arc<dyn TranscriptStore>,
    pub projects: Arc<dyn ProjectStore>,
}

impl Stores {
    /// All three concerns served by one backend.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: ChatSessionStore + TranscriptStore + ProjectStore + 'static,
    {
        Self {
            sessions: store.clone(),
            transcripts: store.clone(),
            projects: store,
        }
    }
}

/// External services the handlers call out to.
#[derive(Clone)]
pub struct Services {
    pub provider: Arc<dyn CompletionProvider>,
    pub objects: Arc<dyn ObjectStore>,
    pub jobs: Arc<dyn TranscriptionJobs>,
    pub speech: Arc<dyn SpeechToText>,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub context: ContextAssembler,
    pub generator: Generator,
    pub ingest: Arc<IngestService>,
}

impl AppState {
    pub fn new(settings: &Settings, stores: Stores, services: Services) -> Self {
        let session_cache = RecordCache::new("sessions");
        let transcript_cache = RecordCache::new("transcripts");

        let sessions = SessionManager::new(
            stores.sessions.clone(),
            session_cache,
            SessionConfig {
                max_history_save_length: settings.chat.max_history_save_length,
                session_ttl: Duration::minutes(settings.cache.session_ttl_minutes),
            },
        );

        let context = ContextAssembler::new(
            stores.transcripts.clone(),
            stores.projects.clone(),
            transcript_cache.clone(),
            settings.chat.context_repeat,
            Duration::minutes(settings.cache.transcript_ttl_minutes),
        );

        let generator = Generator::new(
            services.provider,
            settings.prompts.clone(),
            context.clone(),
            stores.transcripts.clone(),
        );

        let ingest = Arc::new(IngestService::new(
            services.objects,
            services.jobs,
            services.speech,
            stores.transcripts,
            transcript_cache,
            settings.upload.bucket.clone(),
        ));

        Self {
            sessions,
            context,
            generator,
            ingest,
        }
    }

    /// Every cache the expiry sweeper should prune.
    pub fn sweepable_caches(&self) -> Vec<Arc<dyn Sweep>> {
        vec![
            Arc::new(self.sessions.cache().clone()),
            Arc::new(self.context.cache().clone()),
        ]
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        vec![self.sessions.cache().stats(), self.context.cache().stats()]
    }
}
