//! # Papyrus LLM client
//!
//! A small client for OpenAI-compatible chat completion endpoints, used by the
//! Papyrus API for question generation, grid answering and streaming chat.
//!
//! ## Features
//!
//! - **Provider trait**: [`CompletionProvider`] decouples callers from the HTTP
//!   client so tests can script responses
//! - **Streaming**: incremental text fragments decoded from server-sent events
//! - **Structured output**: [`parse_structured`] turns model output into typed
//!   values and fails loudly on anything that is not strict JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use papyrus_llm::{ClientConfig, CompletionProvider, CompletionRequest, Message, OpenAiClient};
//!
//! #[tokio::main]
//! async fn main() -> papyrus_llm::Result<()> {
//!     let client = OpenAiClient::new(ClientConfig::new("sk-..."))?;
//!     let request = CompletionRequest::new("gpt-4o-mini", vec![Message::user("Hello")]);
//!
//!     let mut stream = client.complete_stream(request).await?;
//!     while let Some(fragment) = stream.next().await {
//!         print!("{}", fragment?);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

mod client;
mod errors;
pub mod sse;
mod structured;
mod types;

pub use client::{ClientConfig, CompletionProvider, CompletionStream, DEFAULT_BASE_URL, OpenAiClient};
pub use errors::{LlmError, Result};
pub use structured::parse_structured;
pub use types::{
    ChunkChoice, ChunkDelta, CompletionChoice, CompletionChunk, CompletionRequest,
    CompletionResponse, Message, ResponseMessage, Role,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        CompletionProvider, CompletionRequest, LlmError, Message, OpenAiClient, Result, Role,
    };
}
