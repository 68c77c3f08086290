//! Wire types for the chat-completions API and the question JSON the model
//! is asked to produce. Never exposed to clients.

use crate::models::question::Difficulty;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u32>,
    #[serde(default)]
    pub completion_tokens: Option<u32>,
    #[serde(default)]
    pub total_tokens: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOption {
    pub option_id: String,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmQuestion {
    #[serde(default)]
    pub question_number: Option<u32>,
    pub question: String,
    pub options: Vec<LlmOption>,
    pub difficulty: Difficulty,
    pub difficulty_rating: i64,
    #[serde(default)]
    pub min_solve_time_seconds: Option<i64>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub source_chunk_index: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGenerationOutput {
    pub questions: Vec<LlmQuestion>,
}
