//! Answer generation from retrieved context

use std::sync::Arc;

use super::prompt::PromptBuilder;
use crate::providers::{ChatRequest, LlmProvider};
use crate::types::{ChatMessage, FailureKind, Generation, Source, SourcedGeneration};

/// Sampling settings for one generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 1000,
        }
    }
}

/// Turns a query plus formatted context into an answer
pub struct AnswerGenerator {
    llm: Arc<dyn LlmProvider>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Whether the provider answers its health endpoint; errors count as unhealthy
    pub async fn is_available(&self) -> bool {
        match self.llm.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!("{} health check failed: {}", self.llm.name(), e);
                false
            }
        }
    }

    /// Make one provider call; failures come back as `Generation::Failed`
    pub async fn generate(&self, query: &str, context: &str, params: GenerationParams) -> Generation {
        let request = ChatRequest {
            messages: vec![
                ChatMessage::system(PromptBuilder::system_prompt()),
                ChatMessage::user(PromptBuilder::user_prompt(query, context)),
            ],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        match self.llm.complete(&request).await {
            Ok(completion) => {
                tracing::debug!(
                    "Generated {} completion tokens ({})",
                    completion.usage.completion,
                    completion.finish_reason
                );
                Generation::Completed {
                    answer: completion.content,
                    model: self.llm.model().to_string(),
                    finish_reason: completion.finish_reason,
                    usage: completion.usage,
                }
            }
            Err(e) => {
                tracing::error!("Answer generation failed: {}", e);
                Generation::failed(self.llm.model(), FailureKind::Provider, e.to_string())
            }
        }
    }

    /// Generate and attach the citation block for `sources`
    pub async fn generate_with_sources(
        &self,
        query: &str,
        context: &str,
        sources: &[Source],
        params: GenerationParams,
    ) -> SourcedGeneration {
        let generation = self.generate(query, context, params).await;

        SourcedGeneration {
            generation,
            formatted_sources: PromptBuilder::format_sources(sources),
            sources: sources.to_vec(),
        }
    }
}
