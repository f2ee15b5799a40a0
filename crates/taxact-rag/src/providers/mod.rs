//! Provider abstractions for embeddings and chat generation
//!
//! Both traits are implemented by an OpenAI-compatible client and an Ollama
//! client; `build_providers` picks one from configuration.

pub mod embedding;
pub mod llm;
pub mod ollama;
pub mod openai;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::{ProviderKind, RagConfig};
use crate::error::Result;

pub use embedding::EmbeddingProvider;
pub use llm::{ChatCompletion, ChatRequest, LlmProvider};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Embedding and generation providers for one configuration
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LlmProvider>,
}

/// Construct the configured providers, sharing one client for both roles
pub fn build_providers(config: &RagConfig) -> Result<Providers> {
    match config.provider {
        ProviderKind::OpenAi => {
            let client = Arc::new(OpenAiClient::new(&config.llm, &config.embeddings)?);
            Ok(Providers {
                embedder: client.clone(),
                llm: client,
            })
        }
        ProviderKind::Ollama => {
            let client = Arc::new(OllamaClient::new(&config.llm, &config.embeddings)?);
            Ok(Providers {
                embedder: client.clone(),
                llm: client,
            })
        }
    }
}

/// Retry a request with exponential backoff
pub(crate) async fn with_retries<F, Fut, T>(max_retries: u32, what: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if attempt < max_retries => {
                let delay = Duration::from_secs(2u64.pow(attempt));
                tracing::warn!(
                    "{} request failed (attempt {}/{}): {}; retrying in {:?}",
                    what,
                    attempt + 1,
                    max_retries + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
