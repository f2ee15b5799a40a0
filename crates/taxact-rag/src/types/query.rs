//! Query request types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Scalar value of an equality filter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Integer(i64),
    Text(String),
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// Equality constraints on indexed chunk metadata fields
///
/// Constraints are conjunctive. Field names are the metadata names stored in
/// the collection (`section_type`, `document_name`, `contains_rate`, ...).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct MetadataFilter(BTreeMap<String, FilterValue>);

impl MetadataFilter {
    /// Empty filter
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality constraint
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterValue)> {
        self.0.iter()
    }
}

/// One chat turn, used for provider requests and conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Query request for the RAG pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The question to answer
    pub question: String,

    /// Earlier turns (accepted but not used; the pipeline is single-turn)
    #[serde(default)]
    pub conversation_history: Vec<ChatMessage>,

    /// Optional metadata filters
    #[serde(default)]
    pub filters: Option<MetadataFilter>,

    /// Per-query override of the retriever's default result count
    #[serde(default)]
    pub top_k: Option<usize>,

    /// Sampling temperature (default: 0.1)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token limit (default: 1000)
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1000
}

impl QueryRequest {
    /// Create a request with default generation settings
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            conversation_history: Vec::new(),
            filters: None,
            top_k: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    pub fn with_filters(mut self, filters: MetadataFilter) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Gate applied by front ends before a request reaches the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.question.trim().is_empty() {
            return Err(Error::InvalidQuery("Question cannot be empty".to_string()));
        }
        if self.top_k == Some(0) {
            return Err(Error::InvalidQuery("top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}

const TAX_KEYWORDS: &[&str] = &[
    "tax", "vat", "firs", "revenue", "income", "corporation",
    "paye", "withholding", "capital gains", "dividend",
    "deduction", "exemption", "relief", "assessment",
    "digital asset", "cryptocurrency", "nft", "blockchain",
    "freelancer", "company", "individual", "taxable",
    "commencement", "2025", "2026", "reform", "act",
    "nigeria revenue service", "nrs", "duty", "levy",
    "tin", "tax identification number", "cac", "registration",
    "compliance", "business registration", "filing",
];

/// Whether a question falls within the tax-law corpus scope
///
/// Substring keyword match, so it errs on the side of answering.
pub fn is_tax_related(question: &str) -> bool {
    let lower = question.to_lowercase();
    TAX_KEYWORDS.iter().any(|k| lower.contains(k))
}
