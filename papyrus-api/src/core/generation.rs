use papyrus_llm::{CompletionProvider, CompletionRequest, Message, parse_structured};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::core::config::{PromptConfig, PromptsConfig};
use crate::core::context::ContextAssembler;
use crate::core::storage::TranscriptStore;
use crate::models::error::{ApiError, ApiResult, ErrorCode};

/// Prompt construction and structured LLM calls for the question and grid
/// endpoints, plus the chat prompt wrapper.
#[derive(Clone)]
pub struct Generator {
    provider: Arc<dyn CompletionProvider>,
    prompts: PromptsConfig,
    context: ContextAssembler,
    transcripts: Arc<dyn TranscriptStore>,
}

fn single_message_request(config: &PromptConfig, content: String) -> CompletionRequest {
    CompletionRequest::new(
        config.model.clone(),
        vec![Message::new(config.role, content)],
    )
    .with_max_tokens(config.max_tokens)
}

impl Generator {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        prompts: PromptsConfig,
        context: ContextAssembler,
        transcripts: Arc<dyn TranscriptStore>,
    ) -> Self {
        Self {
            provider,
            prompts,
            context,
            transcripts,
        }
    }

    async fn complete_structured(
        &self,
        request: CompletionRequest,
        code: ErrorCode,
        what: &str,
    ) -> ApiResult<Value> {
        let failure = |e: papyrus_llm::LlmError| {
            error!("Structured completion failed ({}): {}", code.as_u16(), e);
            ApiError::generation(
                code,
                format!("Failed to generate {what} from LLM with error: {e}"),
            )
        };

        let raw = self.provider.complete(request).await.map_err(failure)?;
        parse_structured::<Value>(&raw).map_err(failure)
    }

    pub fn transcript_questions_prompt(&self, text: &str) -> String {
        format!(
            "Question to be answered: {} \n\n Answer Format Rules: {} \n\n Transcript as context: {}",
            self.prompts.question.prompt, self.prompts.question.format, text
        )
    }

    /// Questions generated from a single transcript.
    pub async fn transcript_questions(&self, transcript_id: &str) -> ApiResult<Value> {
        let text = self.context.transcript_text(transcript_id).await?;
        let prompt = self.transcript_questions_prompt(&text);

        let request = single_message_request(&self.prompts.question, prompt);
        let questions = self
            .complete_structured(request, ErrorCode::QuestionGeneration, "questions")
            .await?;

        info!("Generated questions for transcript {}", transcript_id);
        Ok(questions)
    }

    /// Per-transcript question listing fed into the aggregation prompt.
    async fn project_question_listing(&self, transcript_ids: &[String]) -> ApiResult<String> {
        let mut listing = String::new();

        for (i, transcript_id) in transcript_ids.iter().enumerate() {
            let record = self
                .transcripts
                .find_transcript(transcript_id)
                .await
                .map_err(|e| {
                    ApiError::not_found(
                        ErrorCode::TranscriptLookup,
                        format!("Error finding transcript {transcript_id}: {e}"),
                    )
                })?
                .ok_or_else(|| {
                    ApiError::not_found(
                        ErrorCode::TranscriptProcessing,
                        format!("Error processing transcript {transcript_id}: record not found"),
                    )
                })?;

            let questions = record.questions.unwrap_or(Value::Null);
            listing.push_str(&format!(
                "Transcript {i} \n Questions asked in transcript: {questions})\n\n"
            ));
        }

        Ok(listing)
    }

    pub fn aggregate_prompt(&self, num_q: usize, listing: &str) -> String {
        [
            self.prompts
                .aggregate
                .prompt
                .replace("<n>", &num_q.to_string()),
            self.prompts.aggregate.format.clone(),
            listing.to_string(),
        ]
        .join("\n\n")
    }

    /// `num_q` questions aggregated across every transcript of a project.
    pub async fn project_questions(&self, project_id: &str, num_q: usize) -> ApiResult<Value> {
        let transcript_ids = self.context.project_transcripts(project_id).await?;
        let listing = self.project_question_listing(&transcript_ids).await?;

        if listing.is_empty() {
            return Err(ApiError::not_found(
                ErrorCode::NoValidContent,
                "No valid content found in transcripts",
            ));
        }

        let request =
            single_message_request(&self.prompts.aggregate, self.aggregate_prompt(num_q, &listing));
        let questions = self
            .complete_structured(request, ErrorCode::QuestionGeneration, "questions")
            .await?;

        info!(
            "Aggregated {} questions across {} transcripts of project {}",
            num_q,
            transcript_ids.len(),
            project_id
        );
        Ok(questions)
    }

    pub fn grid_prompt(&self, text: &str, question: &Map<String, Value>) -> String {
        [
            self.prompts.grid.prompt.clone(),
            format!("Context: {text}"),
            format!("Question: {}", Value::Object(question.clone())),
            format!(
                "Answer the question in the following format: {}",
                self.prompts.grid.format
            ),
        ]
        .join("\n\n")
    }

    /// Answers to a grid of questions over one transcript.
    pub async fn grid_answer(
        &self,
        transcript_id: &str,
        question: &Map<String, Value>,
    ) -> ApiResult<Value> {
        let text = self.context.transcript_text(transcript_id).await?;
        let request = single_message_request(&self.prompts.grid, self.grid_prompt(&text, question));

        let answer = self
            .complete_structured(request, ErrorCode::AnswerGeneration, "answers")
            .await?;
        debug!("Answered grid question for transcript {}", transcript_id);
        Ok(answer)
    }

    /// The user question wrapped in the chat prompt and format rules.
    pub fn chat_prompt(&self, question: &str) -> String {
        [
            self.prompts.chat.prompt.clone(),
            format!("Question: {question}"),
            format!("Format: {}", self.prompts.chat.format),
        ]
        .join("\n\n")
    }

    pub fn chat_request(&self, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest::new(self.prompts.chat.model.clone(), messages)
            .with_max_tokens(self.prompts.chat.max_tokens)
    }

    pub fn provider(&self) -> &Arc<dyn CompletionProvider> {
        &self.provider
    }
}
