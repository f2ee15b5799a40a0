//! Core types for the RAG system

pub mod chunk;
pub mod query;
pub mod response;
pub mod section;

pub use chunk::{Chunk, ChunkMetadata, ChunkMetadataRecord};
pub use query::{is_tax_related, ChatMessage, FilterValue, MetadataFilter, QueryRequest};
pub use response::{
    FailureKind, Generation, GenerationFailure, QueryResult, ResultId, RetrievalResult, Source,
    SourcedGeneration, TokenUsage,
};
pub use section::{DocumentContext, PageText, ParsedDocument, ParsedMetadata, Section, SectionType};
