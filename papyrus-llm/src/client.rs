//! Completion provider abstraction and the OpenAI-compatible HTTP client

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::errors::{LlmError, Result};
use crate::sse::{SseData, SseDecoder};
use crate::types::{CompletionChunk, CompletionRequest, CompletionResponse};

/// Default OpenAI API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Stream of text fragments produced by a streaming completion
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Anything that can answer chat completion requests
///
/// Implementations must be thread-safe as a single provider is shared by
/// every request handler.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run a request/response completion and return the first choice's text
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Run a streaming completion
    ///
    /// Errors that happen before the first byte (connection, non-success
    /// status) are returned directly; later failures surface as stream items.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<CompletionStream>;
}

/// Connection settings for [`OpenAiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Whole-request timeout, including streamed bodies
    pub timeout: Duration,
}

impl ClientConfig {
    /// Config for the public OpenAI endpoint
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl OpenAiClient {
    /// Build a client; fails if the API key is blank
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("API key must not be empty".to_string()));
        }

        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn send(&self, request: &CompletionRequest) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Completion provider returned {}: {}", status, body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    #[instrument(skip(self, request), fields(model = %request.model), level = "debug")]
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let response: CompletionResponse = self.send(&request).await?.json().await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyCompletion)?;

        debug!("Completion returned {} bytes", content.len());
        Ok(content)
    }

    #[instrument(skip(self, request), fields(model = %request.model), level = "debug")]
    async fn complete_stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let response = self.send(&request.streaming()).await?;
        let mut bytes = response.bytes_stream();

        let stream: CompletionStream = Box::pin(async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            let mut done = false;

            while !done {
                let events = match bytes.next().await {
                    Some(chunk) => decoder.feed(&chunk?),
                    None => {
                        done = true;
                        decoder.finish()
                    },
                };

                for event in events {
                    match event {
                        SseData::Done => {
                            done = true;
                            break;
                        },
                        SseData::Json(payload) => {
                            let chunk = parse_chunk(&payload)?;
                            let text = chunk.text();
                            if !text.is_empty() {
                                yield text.to_string();
                            }
                        },
                    }
                }
            }
        });

        Ok(stream)
    }
}

fn parse_chunk(payload: &str) -> Result<CompletionChunk> {
    let value: Value = serde_json::from_str(payload)?;

    if let Some(error) = value.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| error.to_string());
        return Err(LlmError::Stream(message));
    }

    Ok(serde_json::from_value(value)?)
}
