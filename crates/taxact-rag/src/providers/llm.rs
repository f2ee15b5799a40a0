//! LLM provider trait for chat completions

use async_trait::async_trait;
use crate::error::Result;
use crate::types::{ChatMessage, TokenUsage};

/// Chat completion request
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Provider reply to a chat completion request
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

/// Trait for chat-style answer generation
///
/// Implementations:
/// - `OpenAiClient`: OpenAI-compatible `/chat/completions`
/// - `OllamaClient`: Local Ollama server (`/api/chat`)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Run one chat completion
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
