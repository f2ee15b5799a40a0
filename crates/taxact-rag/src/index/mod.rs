//! Index artifacts: exact flat index, filterable collection, and the builder

pub mod builder;
pub mod collection;
pub mod flat;
pub mod manifest;

pub use builder::{BuildOutput, BuildTargets, EmbeddingSet, IndexBuilder};
pub use collection::{chunk_key, ChunkCollection};
pub use flat::FlatIndex;
pub use manifest::{IndexLayout, IndexManifest};
