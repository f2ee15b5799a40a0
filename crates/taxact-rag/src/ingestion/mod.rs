//! Corpus ingestion: section chunking, feature detection, and the chunk store

mod chunk_store;
mod chunker;
pub mod features;

pub use chunk_store::{
    load_parsed_documents, ChunkRunReport, ChunkStore, FeatureStatistics, ValidationReport,
};
pub use chunker::{fingerprint, normalize_text, split_into_sentences, DedupContext, SectionChunker};
pub use features::ChunkFeatures;
