//! Fakes shared by unit and endpoint tests.

use async_trait::async_trait;
use futures::stream;
use papyrus_llm::{CompletionProvider, CompletionRequest, CompletionStream, LlmError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::core::config::Settings;
use crate::core::object_store::MockObjectStore;
use crate::core::state::{AppState, Services, Stores};
use crate::core::storage::{ChatSessionStore, InMemoryStore};
use crate::core::transcription::{MockSpeechToText, MockTranscriptionJobs};
use crate::models::session::ChatSession;

/// How a scripted streaming call behaves.
#[derive(Debug, Clone)]
pub enum StreamScript {
    Fragments(Vec<String>),
    /// Yield the fragments, then a mid-stream error.
    FailAfter(Vec<String>, String),
    /// Fail before any fragment is produced.
    OpenFails(String),
}

impl StreamScript {
    pub fn fragments(parts: &[&str]) -> Self {
        Self::Fragments(parts.iter().map(|s| s.to_string()).collect())
    }

    pub fn fail_after(parts: &[&str], error: &str) -> Self {
        Self::FailAfter(parts.iter().map(|s| s.to_string()).collect(), error.to_string())
    }
}

/// Completion provider that replays canned responses and records requests.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<String, String>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: &str) -> Self {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
        self
    }

    pub fn with_failure(self, error: &str) -> Self {
        self.replies.lock().unwrap().push_back(Err(error.to_string()));
        self
    }

    pub fn with_stream(self, script: StreamScript) -> Self {
        self.streams.lock().unwrap().push_back(script);
        self
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> papyrus_llm::Result<String> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(body)) => Err(LlmError::Api { status: 503, body }),
            None => Err(LlmError::EmptyCompletion),
        }
    }

    async fn complete_stream(
        &self,
        request: CompletionRequest,
    ) -> papyrus_llm::Result<CompletionStream> {
        self.requests.lock().unwrap().push(request);
        let script = self
            .streams
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| StreamScript::fragments(&["ok"]));

        let items: Vec<papyrus_llm::Result<String>> = match script {
            StreamScript::Fragments(parts) => parts.into_iter().map(Ok).collect(),
            StreamScript::FailAfter(parts, error) => parts
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(LlmError::Stream(error))))
                .collect(),
            StreamScript::OpenFails(body) => return Err(LlmError::Api { status: 503, body }),
        };

        Ok(Box::pin(stream::iter(items)))
    }
}

/// Session store whose reads succeed and whose writes always fail.
pub struct ReadOnlySessions(pub Arc<InMemoryStore>);

#[async_trait]
impl ChatSessionStore for ReadOnlySessions {
    async fn find_session(&self, id: &str) -> anyhow::Result<Option<ChatSession>> {
        self.0.find_session(id).await
    }

    async fn upsert_session(&self, _session: &ChatSession) -> anyhow::Result<()> {
        anyhow::bail!("write rejected")
    }
}

/// App state over in-memory stores with inert object storage and
/// transcription mocks.
pub fn test_state(store: Arc<InMemoryStore>, provider: Arc<ScriptedProvider>) -> AppState {
    test_state_with(Stores::shared(store), provider)
}

pub fn test_state_with(stores: Stores, provider: Arc<ScriptedProvider>) -> AppState {
    AppState::new(
        &Settings::for_tests(),
        stores,
        Services {
            provider,
            objects: Arc::new(MockObjectStore::new()),
            jobs: Arc::new(MockTranscriptionJobs::new()),
            speech: Arc::new(MockSpeechToText::new()),
        },
    )
}
