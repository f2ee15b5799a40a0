//! Retrieval and answer types

use serde::{Deserialize, Serialize};
use std::fmt;

use super::chunk::ChunkMetadata;

/// Back-reference from a result into the index it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultId {
    /// Row of the flat index
    Ordinal(usize),
    /// Synthetic collection key (`chunk_{i}`)
    Key(String),
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ordinal(i) => write!(f, "{}", i),
            Self::Key(k) => f.write_str(k),
        }
    }
}

/// One ranked chunk returned for a query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub id: ResultId,
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Squared L2 distance to the query (lower is closer)
    pub distance: f32,
}

/// Human-readable citation derived from a result's metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Source {
    pub document: String,
    pub section: String,
    pub title: String,
    /// `"start-end"`, or empty when the page is unknown
    pub pages: String,
    #[serde(rename = "type")]
    pub section_type: String,
}

impl Source {
    /// Build a citation from chunk metadata
    pub fn from_metadata(metadata: &ChunkMetadata) -> Self {
        let document = if metadata.document_name.is_empty() {
            "Unknown".to_string()
        } else {
            metadata.document_name.clone()
        };

        let pages = if metadata.page_start > 0 {
            format!("{}-{}", metadata.page_start, metadata.page_end)
        } else {
            String::new()
        };

        Self {
            document,
            section: metadata.section_number.clone(),
            title: metadata.section_title.clone(),
            pages,
            section_type: metadata.section_type.as_str().to_string(),
        }
    }

    /// Citation line without the list number
    pub fn format_citation(&self) -> String {
        let mut parts = Vec::new();

        if !self.document.is_empty() {
            parts.push(self.document.clone());
        }
        if !self.section.is_empty() {
            parts.push(format!("Section {}", self.section));
        }
        if !self.title.is_empty() {
            parts.push(format!("- {}", self.title));
        }
        if !self.pages.is_empty() {
            parts.push(format!("(Pages {})", self.pages));
        }

        parts.join(" ")
    }
}

/// Token accounting reported by the generation provider
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

impl TokenUsage {
    pub fn new(prompt: u32, completion: u32) -> Self {
        Self {
            prompt,
            completion,
            total: prompt.saturating_add(completion),
        }
    }

    /// Keep the provider's own total when it reports one
    pub fn with_total(mut self, total: Option<u32>) -> Self {
        if let Some(total) = total {
            self.total = total;
        }
        self
    }
}

/// Stage at which a query failed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Query embedding or index search failed
    Retrieval,
    /// Filters were rejected by a backend without filter support
    UnsupportedFilter,
    /// The generation provider call failed
    Provider,
}

/// Why no answer was generated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Generation {
    Completed {
        answer: String,
        model: String,
        finish_reason: String,
        usage: TokenUsage,
    },
    Failed {
        model: String,
        error: GenerationFailure,
    },
}

/// Finish reason reported for failed generations
pub const ERROR_FINISH_REASON: &str = "error";

impl Generation {
    /// Failed outcome
    pub fn failed(model: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failed {
            model: model.into(),
            error: GenerationFailure {
                kind,
                message: message.into(),
            },
        }
    }

    /// Answer text, or a readable error message for failures
    pub fn answer(&self) -> String {
        match self {
            Self::Completed { answer, .. } => answer.clone(),
            Self::Failed { error, .. } => format!("Error generating answer: {}", error.message),
        }
    }

    pub fn model(&self) -> &str {
        match self {
            Self::Completed { model, .. } | Self::Failed { model, .. } => model,
        }
    }

    pub fn finish_reason(&self) -> &str {
        match self {
            Self::Completed { finish_reason, .. } => finish_reason,
            Self::Failed { .. } => ERROR_FINISH_REASON,
        }
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        match self {
            Self::Completed { usage, .. } => Some(*usage),
            Self::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&GenerationFailure> {
        match self {
            Self::Completed { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Generation plus the citations it was given
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcedGeneration {
    pub generation: Generation,
    /// Numbered citation block for display
    pub formatted_sources: String,
    pub sources: Vec<Source>,
}

/// Final answer object of a pipeline query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// The question as asked
    pub query: String,
    pub generation: Generation,
    pub formatted_sources: String,
    pub sources: Vec<Source>,
    pub retrieved_chunks: usize,
}

impl QueryResult {
    pub fn answer(&self) -> String {
        self.generation.answer()
    }

    pub fn finish_reason(&self) -> &str {
        self.generation.finish_reason()
    }

    pub fn usage(&self) -> Option<TokenUsage> {
        self.generation.usage()
    }

    pub fn model(&self) -> &str {
        self.generation.model()
    }
}
