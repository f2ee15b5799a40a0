//! End-to-end question answering: retrieve, format, generate, assemble

use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::{AnswerGenerator, GenerationParams, PromptBuilder};
use crate::providers::build_providers;
use crate::retrieval::Retriever;
use crate::types::{
    FailureKind, Generation, MetadataFilter, QueryRequest, QueryResult, RetrievalResult,
};

/// Retriever plus generator behind a single query call
pub struct RagPipeline {
    retriever: Retriever,
    generator: AnswerGenerator,
}

impl RagPipeline {
    pub fn new(retriever: Retriever, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    /// Wire providers and the configured backend from built artifacts
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        let providers = build_providers(config)?;
        let retriever = Retriever::from_config(config, providers.embedder)?;
        Ok(Self::new(retriever, AnswerGenerator::new(providers.llm)))
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer a question with citations
    ///
    /// Never fails: retrieval and provider errors are reported through
    /// `QueryResult::generation`.
    pub async fn query(&self, request: &QueryRequest) -> QueryResult {
        let start = Instant::now();
        tracing::info!("Query: \"{}\"", request.question);

        let results = match self
            .retriever
            .retrieve(&request.question, request.filters.as_ref(), request.top_k)
            .await
        {
            Ok(results) => results,
            Err(e) => {
                let kind = match e {
                    Error::UnsupportedFilter { .. } => FailureKind::UnsupportedFilter,
                    _ => FailureKind::Retrieval,
                };
                tracing::error!("Retrieval failed: {}", e);
                return QueryResult {
                    query: request.question.clone(),
                    generation: Generation::failed(self.generator.model(), kind, e.to_string()),
                    formatted_sources: PromptBuilder::format_sources(&[]),
                    sources: Vec::new(),
                    retrieved_chunks: 0,
                };
            }
        };

        let context = self.retriever.format_context(&results);
        let sources = self.retriever.get_sources(&results);

        let params = GenerationParams {
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };
        let sourced = self
            .generator
            .generate_with_sources(&request.question, &context, &sources, params)
            .await;

        tracing::info!(
            "Answered with {} sources in {}ms ({})",
            results.len(),
            start.elapsed().as_millis(),
            sourced.generation.finish_reason()
        );

        QueryResult {
            query: request.question.clone(),
            generation: sourced.generation,
            formatted_sources: sourced.formatted_sources,
            sources: sourced.sources,
            retrieved_chunks: results.len(),
        }
    }

    /// Retrieval only, without generation
    pub async fn search(
        &self,
        query: &str,
        filters: Option<&MetadataFilter>,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievalResult>> {
        self.retriever.retrieve(query, filters, top_k).await
    }
}
