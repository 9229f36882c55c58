use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_top_n() -> usize {
    3
}

fn default_num_q() -> usize {
    10
}

fn default_speaker_number() -> i32 {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub question: String,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuestionsRequest {
    #[serde(default = "default_num_q")]
    pub num_q: usize,
}

impl Default for GenerateQuestionsRequest {
    fn default() -> Self {
        Self {
            num_q: default_num_q(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridQuestionRequest {
    pub question: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscribeMethod {
    #[default]
    Aws,
    Sarvam,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    pub url: String,
    #[serde(default)]
    pub transcribe_method: TranscribeMethod,
    #[serde(default)]
    pub transcribe_lang: Option<String>,
    #[serde(default = "default_speaker_number")]
    pub transcribe_speaker_number: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub transcript: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3UploadRequest {
    pub bot_url: String,
    pub s3_file_path: String,
}
