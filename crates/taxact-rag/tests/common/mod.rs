//! Test doubles and a small tax-law corpus for end-to-end tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

use taxact_rag::config::{BackendKind, FilterPolicy, RagConfig};
use taxact_rag::error::{Error, Result};
use taxact_rag::generation::AnswerGenerator;
use taxact_rag::index::{BuildOutput, IndexBuilder, IndexLayout};
use taxact_rag::ingestion::{ChunkStore, DedupContext, SectionChunker};
use taxact_rag::providers::{ChatCompletion, ChatRequest, EmbeddingProvider, LlmProvider};
use taxact_rag::retrieval::Retriever;
use taxact_rag::types::{
    Chunk, PageText, ParsedDocument, ParsedMetadata, Section, SectionType, TokenUsage,
};
use taxact_rag::RagPipeline;

/// Vocabulary of the keyword embedder; one dimension per word
pub const KEYWORDS: &[&str] = &["vat", "rate", "paye", "employment", "exempt", "gains", "penalty"];

/// Deterministic embedder: dimension `i` is 1.0 when keyword `i` occurs as a word
pub struct KeywordEmbedder {
    calls: Mutex<usize>,
}

impl KeywordEmbedder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(0),
        })
    }

    pub fn vector(text: &str) -> Vec<f32> {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .map(|w| w.to_lowercase())
            .collect();
        KEYWORDS
            .iter()
            .map(|k| if words.iter().any(|w| w == k) { 1.0 } else { 0.0 })
            .collect()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        *self.calls.lock() += 1;
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }

    fn model(&self) -> &str {
        "keyword"
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Embedder whose every call fails
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::embedding("embedding service unavailable"))
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len()
    }

    fn model(&self) -> &str {
        "keyword"
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// LLM that returns a fixed reply (or error) and records every request
pub struct ScriptedLlm {
    reply: std::result::Result<String, String>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(answer.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn last_user_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .last()
            .and_then(|r| r.messages.iter().find(|m| m.role == "user"))
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        self.requests.lock().push(request.clone());
        match &self.reply {
            Ok(answer) => Ok(ChatCompletion {
                content: answer.clone(),
                finish_reason: "stop".to_string(),
                usage: TokenUsage::new(200, 20),
            }),
            Err(message) => Err(Error::llm(message.clone())),
        }
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.reply.is_ok())
    }

    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-llm"
    }
}

fn section(kind: SectionType, number: &str, title: &str, page: u32, content: &str) -> Section {
    Section::new(kind, number, title, (page, page), content)
}

/// Two acts, four sections, each chunking to exactly one chunk
pub fn sample_corpus() -> Vec<ParsedDocument> {
    vec![
        ParsedDocument {
            filename: "VAT Act 2025".to_string(),
            metadata: ParsedMetadata::default(),
            sections: vec![
                section(
                    SectionType::Section,
                    "146",
                    "Rate of tax",
                    88,
                    "Tax shall be charged at the rate of 7.5% on the value of all taxable \
                     supplies of goods and services. VAT is payable by every taxable person.",
                ),
                section(
                    SectionType::Schedule,
                    "1",
                    "Exempt supplies",
                    120,
                    "The following supplies are exempt from VAT under this Act. Basic food \
                     items, medical and pharmaceutical products, and educational books are exempt.",
                ),
            ],
            pages: Vec::new(),
        },
        ParsedDocument {
            filename: "Nigeria Tax Act 2025".to_string(),
            metadata: ParsedMetadata::default(),
            sections: vec![
                section(
                    SectionType::Section,
                    "5",
                    "Employment income",
                    12,
                    "An employer shall deduct PAYE from the employment income of every \
                     employee. Deductions shall be remitted to the relevant tax authority monthly.",
                ),
                section(
                    SectionType::Section,
                    "12",
                    "Chargeable gains",
                    30,
                    "Gains accruing to a company on the disposal of chargeable assets are \
                     subject to tax. A penalty applies where gains are not reported on time.",
                ),
            ],
            pages: vec![PageText {
                page_number: 1,
                text: String::new(),
            }],
        },
    ]
}

/// Built artifacts for the sample corpus in a temporary directory
pub struct Fixture {
    pub dir: TempDir,
    pub config: RagConfig,
    pub chunks: Vec<Chunk>,
    pub build: BuildOutput,
}

impl Fixture {
    pub async fn build() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = config_for(dir.path(), BackendKind::Flat, FilterPolicy::WarnAndIgnore);

        let chunks = SectionChunker::from_config(&config.chunking)
            .chunk_corpus(&sample_corpus(), &mut DedupContext::new());
        ChunkStore::new(config.paths.chunks_file())
            .write_all(&chunks)
            .expect("write chunk store");

        let build = IndexBuilder::new(KeywordEmbedder::new(), IndexLayout::new(&config.paths.embeddings_dir))
            .with_batch_size(config.embeddings.batch_size)
            .build(&chunks)
            .await
            .expect("build index");

        Self {
            dir,
            config,
            chunks,
            build,
        }
    }

    /// Config pointing at this fixture's artifacts with the given backend settings
    pub fn config(&self, backend: BackendKind, policy: FilterPolicy) -> RagConfig {
        config_for(self.dir.path(), backend, policy)
    }

    pub fn pipeline(
        &self,
        backend: BackendKind,
        policy: FilterPolicy,
        llm: Arc<dyn LlmProvider>,
    ) -> RagPipeline {
        let retriever = Retriever::from_config(&self.config(backend, policy), KeywordEmbedder::new())
            .expect("load retriever");
        RagPipeline::new(retriever, AnswerGenerator::new(llm))
    }
}

pub fn config_for(root: &Path, backend: BackendKind, policy: FilterPolicy) -> RagConfig {
    let mut config = RagConfig::default();
    config.paths.processed_dir = root.join("processed");
    config.paths.embeddings_dir = root.join("embeddings");
    config.embeddings.batch_size = 3;
    config.retrieval.backend = backend;
    config.retrieval.filter_policy = policy;
    config
}
