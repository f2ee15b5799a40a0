//! Query-time retrieval over the flat index or the filterable collection

pub mod backend;
pub mod retriever;

pub use backend::{ExactFlatIndex, FilterableCollectionIndex, RetrievalBackend};
pub use retriever::Retriever;
