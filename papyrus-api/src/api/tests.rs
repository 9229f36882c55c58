use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use papyrus_llm::{CompletionProvider, CompletionRequest, Message, Role};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::chat::relay_turn;
use super::router;
use crate::core::session_manager::PendingTurn;
use crate::core::state::Stores;
use crate::core::storage::InMemoryStore;
use crate::core::testing::{
    ReadOnlySessions, ScriptedProvider, StreamScript, test_state, test_state_with,
};
use crate::models::records::{ProjectRecord, TranscriptRecord};
use crate::models::session::{ChatSession, ConversationEntry};

fn seeded_store() -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    let delete_time = Utc::now() + Duration::hours(1);

    store.insert_transcript(TranscriptRecord::new("T1", "We discussed pricing."));
    store.insert_transcript(TranscriptRecord::new("T2", "Onboarding took two weeks."));
    store.insert_project(ProjectRecord::new("P1", vec!["T1".into(), "T2".into()]));

    store.insert_session(ChatSession::for_transcript("S1", "T1", delete_time));
    store.insert_session(ChatSession::for_project("S2", "P1", delete_time));
    store
}

fn server(store: Arc<InMemoryStore>, provider: Arc<ScriptedProvider>) -> TestServer {
    TestServer::new(router(test_state(store, provider))).unwrap()
}

fn question(text: &str) -> Value {
    json!({ "question": text })
}

#[tokio::test]
async fn test_health_and_stats() {
    let server = server(seeded_store(), Arc::new(ScriptedProvider::new()));

    let health = server.get("/health").await;
    health.assert_status_ok();
    assert_eq!(health.text(), "OK");
    assert!(!health.header("x-request-id").is_empty());

    let stats: Value = server.get("/stats").await.json();
    assert_eq!(stats["caches"][0]["name"], "sessions");
    assert_eq!(stats["caches"][1]["name"], "transcripts");
    assert_eq!(stats["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_chat_transcript_first_turn() {
    let store = seeded_store();
    let provider = Arc::new(
        ScriptedProvider::new().with_stream(StreamScript::fragments(&["Pricing ", "came up."])),
    );
    let server = server(store.clone(), provider.clone());

    let response = server.post("/chat/S1").json(&question("What came up?")).await;
    response.assert_status_ok();
    assert_eq!(response.text(), "Pricing came up.");

    let request = &provider.requests()[0];
    assert_eq!(request.model, "chat-model");
    assert_eq!(
        request.messages,
        vec![
            Message::system("Context: Transcript: We discussed pricing."),
            Message::user("chat prompt\n\nQuestion: What came up?\n\nFormat: chat format"),
        ]
    );

    let saved = store.session("S1").unwrap();
    assert_eq!(saved.num_interactions, 1);
    assert_eq!(saved.history.len(), 3);
    assert_eq!(saved.history[2], Message::assistant("Pricing came up."));
    assert_eq!(
        saved.conversation,
        vec![
            ConversationEntry::user("What came up?"),
            ConversationEntry::bot("Pricing came up."),
        ]
    );
    assert!(saved.delete_time > Utc::now());
}

#[tokio::test]
async fn test_chat_project_without_matches_sends_no_context() {
    let store = seeded_store();
    let provider = Arc::new(ScriptedProvider::new());
    let server = server(store.clone(), provider.clone());

    server
        .post("/chat/S2")
        .json(&question("Any thoughts on zebras?"))
        .await
        .assert_status_ok();

    let messages = &provider.requests()[0].messages;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, Role::User);

    let saved = store.session("S2").unwrap();
    assert_eq!(saved.num_interactions, 1);
    assert_eq!(saved.history.len(), 2);
}

#[tokio::test]
async fn test_chat_project_context_uses_top_matches() {
    let store = seeded_store();
    let provider = Arc::new(ScriptedProvider::new());
    let server = server(store, provider.clone());

    server
        .post("/chat/S2")
        .json(&json!({ "question": "How long was onboarding?", "top_n": 1 }))
        .await
        .assert_status_ok();

    assert_eq!(
        provider.requests()[0].messages[0],
        Message::system("Context: Transcript: Onboarding took two weeks.")
    );
}

#[tokio::test]
async fn test_chat_unknown_session_is_707() {
    let provider = Arc::new(ScriptedProvider::new());
    let server = server(seeded_store(), provider.clone());

    let response = server.post("/chat/nope").json(&question("Hello?")).await;
    assert_eq!(response.status_code().as_u16(), 707);

    let body: Value = response.json();
    assert_eq!(body["detail"], "Cannot find Session ID: nope");
    assert_eq!(body["code"], 707);
    assert_eq!(body["type"], "not_found_error");
    assert!(provider.requests().is_empty());
}

#[tokio::test]
async fn test_chat_stream_open_failure_is_402() {
    let store = seeded_store();
    let provider =
        Arc::new(ScriptedProvider::new().with_stream(StreamScript::OpenFails("overloaded".into())));
    let server = server(store.clone(), provider);

    let response = server.post("/chat/S1").json(&question("Hello?")).await;
    assert_eq!(response.status_code().as_u16(), 402);

    let body: Value = response.json();
    assert!(
        body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Failed to generate answers from LLM in chat with error:")
    );
    assert_eq!(store.session("S1").unwrap().num_interactions, 0);
}

#[tokio::test]
async fn test_chat_mid_stream_failure_appends_trailer_and_skips_write_back() {
    let store = seeded_store();
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_stream(StreamScript::fail_after(&["Partial "], "connection reset")),
    );
    let server = server(store.clone(), provider);

    let response = server.post("/chat/S1").json(&question("Hello?")).await;
    response.assert_status_ok();
    assert_eq!(
        response.text(),
        "Partial \n\n[error 403] Failed to stream chat: Stream error: connection reset"
    );

    let saved = store.session("S1").unwrap();
    assert_eq!(saved.num_interactions, 0);
    assert!(saved.history.is_empty());
}

#[tokio::test]
async fn test_chat_write_failure_appends_trailer_but_refreshes_cache() {
    let store = seeded_store();
    let provider = Arc::new(ScriptedProvider::new().with_stream(StreamScript::fragments(&["Yes."])));
    let stores = Stores {
        sessions: Arc::new(ReadOnlySessions(store.clone())),
        transcripts: store.clone(),
        projects: store.clone(),
    };
    let state = test_state_with(stores, provider);
    let server = TestServer::new(router(state.clone())).unwrap();

    let response = server.post("/chat/S1").json(&question("Hello?")).await;
    let text = response.text();
    assert!(text.starts_with("Yes.\n\n[error 403] Failed to stream chat: failed to save session:"));

    assert_eq!(store.session("S1").unwrap().num_interactions, 0);
    assert_eq!(state.sessions.cache().get("S1").unwrap().num_interactions, 1);
}

#[tokio::test]
async fn test_chat_turns_on_one_session_are_serialized() {
    let store = seeded_store();
    let provider = Arc::new(
        ScriptedProvider::new()
            .with_stream(StreamScript::fragments(&["first"]))
            .with_stream(StreamScript::fragments(&["second"])),
    );
    let server = server(store.clone(), provider);

    let (a, b) = tokio::join!(
        async { server.post("/chat/S1").json(&question("One?")).await },
        async { server.post("/chat/S1").json(&question("Two?")).await },
    );
    a.assert_status_ok();
    b.assert_status_ok();

    let saved = store.session("S1").unwrap();
    assert_eq!(saved.num_interactions, 2);
    assert_eq!(saved.conversation.len(), 4);
}

#[tokio::test]
async fn test_chat_history_is_trimmed_on_write_back() {
    let store = seeded_store();
    let provider = Arc::new(ScriptedProvider::new());
    let server = server(store.clone(), provider);

    for i in 0..4 {
        server
            .post("/chat/S1")
            .json(&question(&format!("Turn {i}?")))
            .await
            .assert_status_ok();
    }

    let saved = store.session("S1").unwrap();
    assert_eq!(saved.num_interactions, 4);
    assert_eq!(saved.history.len(), 4);
    assert_eq!(saved.conversation.len(), 8);
}

#[tokio::test]
async fn test_chat_rejects_missing_question() {
    let server = server(seeded_store(), Arc::new(ScriptedProvider::new()));

    let response = server.post("/chat/S1").json(&json!({ "top_n": 2 })).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_relay_writes_back_after_disconnect() {
    let store = seeded_store();
    let provider =
        Arc::new(ScriptedProvider::new().with_stream(StreamScript::fragments(&["Hello ", "world"])));
    let state = test_state(store.clone(), provider.clone());

    let lease = state.sessions.lock("S1").await;
    let session = state.sessions.resolve("S1").await.unwrap();
    let stream = provider
        .complete_stream(CompletionRequest::new("chat-model", vec![]))
        .await
        .unwrap();

    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    let turn = PendingTurn {
        context: None,
        formatted_question: "wrapped".into(),
        question: "Hi?".into(),
    };
    relay_turn(state.sessions.clone(), lease, session, turn, stream, tx).await;

    let saved = store.session("S1").unwrap();
    assert_eq!(saved.num_interactions, 1);
    assert_eq!(saved.conversation.last(), Some(&ConversationEntry::bot("Hello world")));
}

#[tokio::test]
async fn test_transcript_questions_endpoint() {
    let provider = Arc::new(ScriptedProvider::new().with_reply(r#"["Q1", "Q2"]"#));
    let server = server(seeded_store(), provider);

    let response = server.post("/generate-transcript-questions/T1").await;
    response.assert_status_ok();
    response.assert_json(&json!({ "questions": ["Q1", "Q2"] }));

    let missing = server.post("/generate-transcript-questions/nope").await;
    assert_eq!(missing.status_code().as_u16(), 705);
}

#[tokio::test]
async fn test_project_questions_endpoint_defaults_num_q() {
    let provider = Arc::new(ScriptedProvider::new().with_reply(r#"{"questions": ["A"]}"#));
    let server = server(seeded_store(), provider.clone());

    let response = server.post("/generate-questions/P1").json(&json!({})).await;
    response.assert_status_ok();
    response.assert_json(&json!({ "questions": ["A"] }));
    assert!(
        provider.requests()[0].messages[0]
            .content
            .starts_with("aggregate 10 prompt")
    );
}

#[tokio::test]
async fn test_grid_endpoint() {
    let provider = Arc::new(ScriptedProvider::new().with_reply(r#"{"a": "pricing"}"#));
    let server = server(seeded_store(), provider);

    let response = server
        .post("/get-all-answer-single-transcript-grid/T1")
        .json(&json!({ "question": { "q": "Topic?" } }))
        .await;
    response.assert_status_ok();
    response.assert_json(&json!({ "a": "pricing" }));

    let invalid = server
        .post("/get-all-answer-single-transcript-grid/T1")
        .json(&json!({ "question": "Topic?" }))
        .await;
    invalid.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_ingest_endpoints_reject_unsupported_types() {
    let server = server(seeded_store(), Arc::new(ScriptedProvider::new()));

    let transcribe = server
        .post("/transcribe-file/T1")
        .json(&json!({ "url": "s3://bucket/notes.xlsx" }))
        .await;
    assert_eq!(transcribe.status_code().as_u16(), 306);
    let body: Value = transcribe.json();
    assert_eq!(body["type"], "extraction_error");

    let upload = server
        .post("/upload-s3file-to-s3bucket/S1")
        .json(&json!({ "bot_url": "https://bot.example/rec.pdf", "s3_file_path": "a/b.mp4" }))
        .await;
    assert_eq!(upload.status_code().as_u16(), 306);
}
