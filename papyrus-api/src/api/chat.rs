use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::StreamExt;
use papyrus_llm::{CompletionStream, Message};
use std::convert::Infallible;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::core::session_manager::{PendingTurn, SessionLease, SessionManager};
use crate::core::state::AppState;
use crate::models::{
    error::{ApiError, ApiResult, ErrorCode},
    requests::ChatRequest,
    session::ChatSession,
};

const RELAY_BUFFER: usize = 32;

pub type ChunkSender = mpsc::Sender<Result<Bytes, Infallible>>;

/// Plain-text chunk appended when a turn fails after streaming began.
pub fn error_trailer(detail: &str) -> Bytes {
    Bytes::from(format!(
        "\n\n[error {}] Failed to stream chat: {}",
        ErrorCode::ChatStream.as_u16(),
        detail
    ))
}

pub async fn chat(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Response> {
    let lease = state.sessions.lock(&session_id).await;
    let session = state.sessions.resolve(&session_id).await?;

    let context = state
        .context
        .assemble(&session, &request.question, request.top_n)
        .await?;
    let formatted_question = state.generator.chat_prompt(&request.question);

    let mut messages: Vec<Message> = session.history.clone();
    messages.extend(context.iter().cloned());
    messages.push(Message::user(formatted_question.clone()));

    let stream = state
        .generator
        .provider()
        .complete_stream(state.generator.chat_request(messages))
        .await
        .map_err(|e| {
            error!("Failed to open chat stream for session {}: {}", session_id, e);
            ApiError::generation(
                ErrorCode::ChatGeneration,
                format!("Failed to generate answers from LLM in chat with error: {e}"),
            )
        })?;

    info!(
        "Streaming turn {} for session {}",
        session.num_interactions + 1,
        session_id
    );

    let turn = PendingTurn {
        context,
        formatted_question,
        question: request.question,
    };
    let (tx, rx) = mpsc::channel(RELAY_BUFFER);
    tokio::spawn(relay_turn(
        state.sessions.clone(),
        lease,
        session,
        turn,
        stream,
        tx,
    ));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response())
}

/// Drain the provider stream into the caller's channel, then write the turn
/// back. The lease is held until the write-back finishes. A closed channel
/// stops forwarding but never the drain.
pub async fn relay_turn(
    sessions: SessionManager,
    lease: SessionLease,
    session: ChatSession,
    turn: PendingTurn,
    mut stream: CompletionStream,
    tx: ChunkSender,
) {
    let mut answer = String::new();
    let mut connected = true;

    while let Some(fragment) = stream.next().await {
        match fragment {
            Ok(text) => {
                answer.push_str(&text);
                if connected && tx.send(Ok(Bytes::from(text))).await.is_err() {
                    debug!(
                        "Client left session {}, finishing turn without relay",
                        lease.session_id()
                    );
                    connected = false;
                }
            },
            Err(e) => {
                error!(
                    "Chat stream for session {} failed mid-turn: {}",
                    lease.session_id(),
                    e
                );
                let _ = tx.send(Ok(error_trailer(&e.to_string()))).await;
                return;
            },
        }
    }

    if let Err(e) = sessions.record_turn(session, turn, &answer).await {
        let _ = tx
            .send(Ok(error_trailer(&format!("failed to save session: {e}"))))
            .await;
    }
}
