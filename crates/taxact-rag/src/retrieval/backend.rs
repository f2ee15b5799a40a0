//! Retrieval backends over the built index artifacts

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::index::{ChunkCollection, FlatIndex};
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, MetadataFilter, ResultId, RetrievalResult};

/// A searchable index of chunks
#[async_trait]
pub trait RetrievalBackend: Send + Sync {
    /// Backend name for logging and errors
    fn name(&self) -> &str;

    /// Whether `search` honours metadata filters
    fn supports_metadata_filter(&self) -> bool;

    /// Number of indexed chunks
    fn len(&self) -> Result<usize>;

    /// Up to `k` chunks nearest to `query`, closest first
    async fn search(
        &self,
        query: &str,
        filters: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>>;
}

/// Exact L2 search over the flat index, with chunk text from the chunk store
pub struct ExactFlatIndex {
    index: FlatIndex,
    chunks: Vec<Chunk>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl ExactFlatIndex {
    /// Pair an index with its chunks; row `i` must belong to chunk `i`
    pub fn new(
        index: FlatIndex,
        chunks: Vec<Chunk>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        if index.len() != chunks.len() {
            return Err(Error::storage(format!(
                "flat index has {} vectors but the chunk store has {} chunks; rebuild the index",
                index.len(),
                chunks.len()
            )));
        }
        Ok(Self {
            index,
            chunks,
            embedder,
        })
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }
}

#[async_trait]
impl RetrievalBackend for ExactFlatIndex {
    fn name(&self) -> &str {
        "flat"
    }

    fn supports_metadata_filter(&self) -> bool {
        false
    }

    fn len(&self) -> Result<usize> {
        Ok(self.index.len())
    }

    async fn search(
        &self,
        query: &str,
        _filters: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let embedding = self.embedder.embed(query).await?;
        let hits = self.index.search(&embedding, k)?;

        Ok(hits
            .into_iter()
            .map(|(ordinal, distance)| {
                let chunk = &self.chunks[ordinal];
                RetrievalResult {
                    id: ResultId::Ordinal(ordinal),
                    text: chunk.text.clone(),
                    metadata: chunk.metadata(),
                    distance,
                }
            })
            .collect())
    }
}

/// SQLite collection that embeds queries itself and filters in SQL
pub struct FilterableCollectionIndex {
    collection: ChunkCollection,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl FilterableCollectionIndex {
    pub fn new(collection: ChunkCollection, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            collection,
            embedder,
        }
    }

    pub fn collection(&self) -> &ChunkCollection {
        &self.collection
    }
}

#[async_trait]
impl RetrievalBackend for FilterableCollectionIndex {
    fn name(&self) -> &str {
        "collection"
    }

    fn supports_metadata_filter(&self) -> bool {
        true
    }

    fn len(&self) -> Result<usize> {
        self.collection.count()
    }

    async fn search(
        &self,
        query: &str,
        filters: Option<&MetadataFilter>,
        k: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let embedding = self.embedder.embed(query).await?;
        self.collection.query(&embedding, filters, k)
    }
}
