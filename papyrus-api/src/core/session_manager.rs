use chrono::{Duration, Utc};
use dashmap::DashMap;
use papyrus_llm::Message;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::core::cache::RecordCache;
use crate::core::storage::ChatSessionStore;
use crate::models::error::{ApiError, ApiResult, ErrorCode};
use crate::models::session::{ChatSession, ConversationEntry};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// History keeps at most twice this many messages.
    pub max_history_save_length: usize,
    pub session_ttl: Duration,
}

/// The user side of a turn, prepared before the provider is called.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    /// Grounding message to place before the user turn, if one was fetched.
    pub context: Option<Message>,
    /// Prompt-wrapped question as sent to the provider.
    pub formatted_question: String,
    /// The question as the user typed it.
    pub question: String,
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive hold on one session for the duration of a turn.
///
/// Dropping the lease releases the lock and removes the map entry when no
/// other task holds or waits on it.
pub struct SessionLease {
    session_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.session_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn ChatSessionStore>,
    cache: RecordCache<ChatSession>,
    locks: Arc<LockMap>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn ChatSessionStore>,
        cache: RecordCache<ChatSession>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            cache,
            locks: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn cache(&self) -> &RecordCache<ChatSession> {
        &self.cache
    }

    /// Wait for exclusive access to `session_id`.
    pub async fn lock(&self, session_id: &str) -> SessionLease {
        let lock = self
            .locks
            .entry(session_id.to_string())
            .or_default()
            .clone();

        let guard = lock.lock_owned().await;
        debug!("Acquired lock for session {}", session_id);

        SessionLease {
            session_id: session_id.to_string(),
            guard: Some(guard),
            locks: self.locks.clone(),
        }
    }

    /// Cached session, or the durable one (which is then cached until its
    /// stored `delete_time`).
    pub async fn resolve(&self, session_id: &str) -> ApiResult<ChatSession> {
        if let Some(session) = self.cache.get(session_id) {
            debug!("Session {} served from cache", session_id);
            return Ok(session);
        }

        let session = self
            .store
            .find_session(session_id)
            .await
            .map_err(|e| {
                error!("Failed to load session {}: {}", session_id, e);
                ApiError::Internal(format!("Failed to load session {session_id}"))
            })?
            .ok_or_else(|| {
                ApiError::not_found(
                    ErrorCode::SessionNotFound,
                    format!("Cannot find Session ID: {session_id}"),
                )
            })?;

        self.cache
            .put(session_id, session.clone(), session.delete_time);
        info!("Loaded session {} from storage", session_id);
        Ok(session)
    }

    /// Append a completed turn, trim history, and write the session to both
    /// the durable store and the cache.
    ///
    /// The cache is refreshed even when the durable write fails; that failure
    /// is returned afterwards.
    pub async fn record_turn(
        &self,
        mut session: ChatSession,
        turn: PendingTurn,
        answer: &str,
    ) -> anyhow::Result<ChatSession> {
        if let Some(context) = turn.context {
            session.history.push(context);
        }
        session.history.push(Message::user(turn.formatted_question));
        session.history.push(Message::assistant(answer));

        session.conversation.push(ConversationEntry::user(turn.question));
        session.conversation.push(ConversationEntry::bot(answer));

        let keep = 2 * self.config.max_history_save_length;
        if session.history.len() > keep {
            let excess = session.history.len() - keep;
            session.history.drain(..excess);
        }

        let now = Utc::now();
        session.delete_time = now + self.config.session_ttl;
        session.last_updated = Some(now);
        session.num_interactions += 1;

        let persisted = self.store.upsert_session(&session).await;
        self.cache
            .put(session.id.clone(), session.clone(), session.delete_time);

        match persisted {
            Ok(()) => {
                debug!(
                    "Recorded turn {} for session {}",
                    session.num_interactions, session.id
                );
                Ok(session)
            },
            Err(e) => {
                error!("Failed to persist session {}: {}", session.id, e);
                Err(e)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::storage::InMemoryStore;
    use crate::models::session::Speaker;
    use async_trait::async_trait;
    use papyrus_llm::Role;

    struct FailingStore;

    #[async_trait]
    impl ChatSessionStore for FailingStore {
        async fn find_session(&self, _id: &str) -> anyhow::Result<Option<ChatSession>> {
            Ok(None)
        }

        async fn upsert_session(&self, _session: &ChatSession) -> anyhow::Result<()> {
            anyhow::bail!("database unavailable")
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            max_history_save_length: 2,
            session_ttl: Duration::minutes(30),
        }
    }

    fn manager(store: Arc<dyn ChatSessionStore>) -> SessionManager {
        SessionManager::new(store, RecordCache::new("sessions"), config())
    }

    fn turn(question: &str, context: Option<&str>) -> PendingTurn {
        PendingTurn {
            context: context.map(|c| Message::system(format!("Context: {c}"))),
            formatted_question: format!("Question: {question}"),
            question: question.to_string(),
        }
    }

    #[tokio::test]
    async fn test_resolve_unknown_session_is_707() {
        let manager = manager(Arc::new(InMemoryStore::new()));
        let err = manager.resolve("missing").await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::SessionNotFound));
        assert_eq!(err.to_string(), "Cannot find Session ID: missing");
    }

    #[tokio::test]
    async fn test_resolve_caches_with_stored_delete_time() {
        let store = Arc::new(InMemoryStore::new());
        let delete_time = Utc::now() + Duration::minutes(10);
        store.insert_session(ChatSession::for_transcript("s1", "T1", delete_time));

        let manager = manager(store);
        let session = manager.resolve("s1").await.unwrap();
        assert_eq!(session.transcript_id.as_deref(), Some("T1"));
        assert_eq!(manager.cache().expiry("s1"), Some(delete_time));

        manager.resolve("s1").await.unwrap();
        assert_eq!(manager.cache().stats().hits, 1);
    }

    #[tokio::test]
    async fn test_record_turn_appends_and_extends() {
        let store = Arc::new(InMemoryStore::new());
        let before = Utc::now();
        let session = ChatSession::for_transcript("s1", "T1", before);

        let manager = manager(store.clone());
        let session = manager
            .record_turn(session, turn("What is the topic?", Some("Transcript: hi")), "Rust.")
            .await
            .unwrap();

        assert_eq!(session.num_interactions, 1);
        assert_eq!(session.history.len(), 3);
        assert_eq!(session.history[0].role, Role::System);
        assert_eq!(session.history[1].content, "Question: What is the topic?");
        assert_eq!(session.history[2].role, Role::Assistant);
        assert_eq!(session.conversation[0].role, Speaker::User);
        assert_eq!(session.conversation[0].message, "What is the topic?");
        assert_eq!(session.conversation[1].message, "Rust.");
        assert!(session.delete_time >= before + Duration::minutes(30));
        assert!(session.last_updated.is_some());

        assert_eq!(store.session("s1").unwrap(), session);
        assert_eq!(manager.cache().get("s1").unwrap(), session);
    }

    #[tokio::test]
    async fn test_record_turn_trims_to_most_recent() {
        let manager = manager(Arc::new(InMemoryStore::new()));
        let mut session = ChatSession::for_transcript("s1", "T1", Utc::now());

        for i in 0..4 {
            session = manager
                .record_turn(session, turn(&format!("q{i}"), None), &format!("a{i}"))
                .await
                .unwrap();
        }

        assert_eq!(session.history.len(), 4);
        let contents: Vec<_> = session.history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["Question: q2", "a2", "Question: q3", "a3"]);
        assert_eq!(session.conversation.len(), 8);
        assert_eq!(session.num_interactions, 4);
    }

    #[tokio::test]
    async fn test_record_turn_refreshes_cache_when_store_fails() {
        let manager = manager(Arc::new(FailingStore));
        let session = ChatSession::for_transcript("s1", "T1", Utc::now());

        let result = manager.record_turn(session, turn("q", None), "a").await;
        assert!(result.is_err());

        let cached = manager.cache().get("s1").unwrap();
        assert_eq!(cached.num_interactions, 1);
    }

    #[tokio::test]
    async fn test_lock_serialises_and_cleans_up() {
        let manager = manager(Arc::new(InMemoryStore::new()));

        let lease = manager.lock("s1").await;
        assert_eq!(lease.session_id(), "s1");

        let contender = {
            let manager = manager.clone();
            tokio::spawn(async move {
                let _lease = manager.lock("s1").await;
            })
        };

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(lease);
        contender.await.unwrap();
        assert!(manager.locks.is_empty());
    }
}
