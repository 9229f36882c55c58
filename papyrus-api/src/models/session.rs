use chrono::{DateTime, Utc};
use papyrus_llm::Message;
use serde::{Deserialize, Serialize};

/// What a chat session is grounded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Project,
    Transcript,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Bot,
}

/// Human-readable log line, distinct from the LLM-facing history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub role: Speaker,
    pub message: String,
}

impl ConversationEntry {
    pub fn user(message: impl Into<String>) -> Self {
        Self {
            role: Speaker::User,
            message: message.into(),
        }
    }

    pub fn bot(message: impl Into<String>) -> Self {
        Self {
            role: Speaker::Bot,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    /// Bounded, LLM-facing history (system/user/assistant).
    #[serde(default)]
    pub history: Vec<Message>,
    /// Unbounded user/bot log.
    #[serde(default)]
    pub conversation: Vec<ConversationEntry>,
    pub chat_type: ChatType,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub transcript_id: Option<String>,
    #[serde(default)]
    pub num_interactions: u64,
    pub delete_time: DateTime<Utc>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

impl ChatSession {
    /// A session as the external backend creates it: no turns yet.
    pub fn new(id: impl Into<String>, chat_type: ChatType, delete_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
            conversation: Vec::new(),
            chat_type,
            project_id: None,
            transcript_id: None,
            num_interactions: 0,
            delete_time,
            last_updated: None,
        }
    }

    pub fn for_transcript(
        id: impl Into<String>,
        transcript_id: impl Into<String>,
        delete_time: DateTime<Utc>,
    ) -> Self {
        Self {
            transcript_id: Some(transcript_id.into()),
            ..Self::new(id, ChatType::Transcript, delete_time)
        }
    }

    pub fn for_project(
        id: impl Into<String>,
        project_id: impl Into<String>,
        delete_time: DateTime<Utc>,
    ) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::new(id, ChatType::Project, delete_time)
        }
    }
}
