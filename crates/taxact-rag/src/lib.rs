//! taxact-rag: retrieval-augmented Q&A over the Nigerian Tax Reform Acts
//!
//! Parsed legal documents are split into section-aware chunks, embedded into
//! an exact flat index and a filterable SQLite collection, and queried
//! through a pipeline that returns a generated answer with section-level
//! citations.

pub mod config;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use pipeline::RagPipeline;
pub use types::{
    Chunk, Generation, MetadataFilter, QueryRequest, QueryResult, RetrievalResult, Source,
};
