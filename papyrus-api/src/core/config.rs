use config::{Config, ConfigError, Environment, File};
use papyrus_llm::Role;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub cache: CacheConfig,
    pub chat: ChatConfig,
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub upload: UploadConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Neo4j,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub neo4j: Option<Neo4jSettings>,
    pub meilisearch: Option<MeilisearchSettings>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Neo4jSettings {
    pub uri: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MeilisearchSettings {
    pub url: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Sweeper interval (`CACHE_TIMER`).
    pub timer_seconds: u64,
    pub session_ttl_minutes: i64,
    pub transcript_ttl_minutes: i64,
}

impl CacheConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.timer_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ChatConfig {
    /// Number of user/assistant pairs kept in history on write-back.
    pub max_history_save_length: usize,
    /// Grounding context is refreshed every this many interactions.
    pub context_repeat: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptConfig {
    pub prompt: String,
    pub format: String,
    pub role: Role,
    pub model: String,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PromptsConfig {
    pub question: PromptConfig,
    pub aggregate: PromptConfig,
    pub grid: PromptConfig,
    pub chat: PromptConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct TranscriptionConfig {
    pub aws_region: String,
    pub poll_interval_seconds: u64,
    pub sarvam_api_url: String,
    pub sarvam_api_key: Option<String>,
    pub sarvam_model: String,
    pub ffmpeg_command: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            aws_region: "ap-south-1".to_string(),
            poll_interval_seconds: 10,
            sarvam_api_url: "https://api.sarvam.ai/speech-to-text".to_string(),
            sarvam_api_key: None,
            sarvam_model: "saarika:v2".to_string(),
            ffmpeg_command: "ffmpeg".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UploadConfig {
    pub bucket: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            bucket: "papyrus-ml-mvp1-uxr".to_string(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("llm.base_url", papyrus_llm::DEFAULT_BASE_URL)?
            .set_default("llm.timeout_seconds", 300)?
            .set_default("storage.backend", "memory")?
            .set_default("cache.session_ttl_minutes", 30)?
            .set_default("cache.transcript_ttl_minutes", 30)?
            .set_default("prompts.question.role", "user")?
            .set_default("prompts.aggregate.role", "user")?
            .set_default("prompts.grid.role", "user")?
            .set_default("prompts.chat.role", "user")?
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("PAPYRUS").separator("__"))
            .build()?;

        let settings: Settings = s.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chat.context_repeat == 0 {
            return Err(ConfigError::Message(
                "chat.context_repeat must be greater than zero".to_string(),
            ));
        }
        if self.chat.max_history_save_length == 0 {
            return Err(ConfigError::Message(
                "chat.max_history_save_length must be greater than zero".to_string(),
            ));
        }
        if self.cache.timer_seconds == 0 {
            return Err(ConfigError::Message(
                "cache.timer_seconds must be greater than zero".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Neo4j && self.storage.neo4j.is_none() {
            return Err(ConfigError::Message(
                "storage.neo4j must be set when storage.backend is neo4j".to_string(),
            ));
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        let prompt = |name: &str| PromptConfig {
            prompt: format!("{name} prompt"),
            format: format!("{name} format"),
            role: Role::User,
            model: format!("{name}-model"),
            max_tokens: 256,
        };

        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            llm: LlmConfig {
                api_key: "sk-test".to_string(),
                base_url: papyrus_llm::DEFAULT_BASE_URL.to_string(),
                timeout_seconds: 5,
            },
            storage: StorageConfig::default(),
            cache: CacheConfig {
                timer_seconds: 60,
                session_ttl_minutes: 30,
                transcript_ttl_minutes: 30,
            },
            chat: ChatConfig {
                max_history_save_length: 2,
                context_repeat: 3,
            },
            prompts: PromptsConfig {
                question: prompt("question"),
                aggregate: prompt("aggregate <n>"),
                grid: prompt("grid"),
                chat: prompt("chat"),
            },
            transcription: TranscriptionConfig::default(),
            upload: UploadConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_zero_context_repeat() {
        let mut settings = Settings::for_tests();
        settings.chat.context_repeat = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_history_length() {
        let mut settings = Settings::for_tests();
        settings.chat.max_history_save_length = 0;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("max_history_save_length"));

        settings.chat.max_history_save_length = 1;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_neo4j_settings() {
        let mut settings = Settings::for_tests();
        settings.storage.backend = StorageBackend::Neo4j;
        assert!(settings.validate().is_err());

        settings.storage.neo4j = Some(Neo4jSettings {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "secret".to_string(),
        });
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_prompt_role_deserializes() {
        let prompt: PromptConfig = serde_json::from_str(
            r#"{"prompt":"p","format":"f","role":"system","model":"m","max_tokens":10}"#,
        )
        .unwrap();
        assert_eq!(prompt.role, Role::System);
    }
}
