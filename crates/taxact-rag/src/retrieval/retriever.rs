//! Query-time retrieval with filter policy and per-call result counts

use std::sync::Arc;

use super::backend::{ExactFlatIndex, FilterableCollectionIndex, RetrievalBackend};
use crate::config::{BackendKind, FilterPolicy, RagConfig};
use crate::error::{Error, Result};
use crate::generation::PromptBuilder;
use crate::index::{ChunkCollection, FlatIndex, IndexLayout, IndexManifest};
use crate::ingestion::ChunkStore;
use crate::providers::EmbeddingProvider;
use crate::types::{MetadataFilter, RetrievalResult, Source};

/// Retrieves ranked chunks from one backend
///
/// Immutable after construction, so one retriever can serve concurrent queries.
pub struct Retriever {
    backend: Box<dyn RetrievalBackend>,
    default_top_k: usize,
    filter_policy: FilterPolicy,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("default_top_k", &self.default_top_k)
            .field("filter_policy", &self.filter_policy)
            .finish_non_exhaustive()
    }
}

impl Retriever {
    pub fn new(
        backend: Box<dyn RetrievalBackend>,
        default_top_k: usize,
        filter_policy: FilterPolicy,
    ) -> Self {
        Self {
            backend,
            default_top_k,
            filter_policy,
        }
    }

    /// Load the configured backend from the artifacts of a previous build
    ///
    /// Fails fast on missing artifacts or when the artifacts disagree with
    /// the build manifest.
    pub fn from_config(config: &RagConfig, embedder: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let layout = IndexLayout::new(&config.paths.embeddings_dir);
        let manifest = IndexManifest::load(&layout.manifest())?;

        if manifest.embedding_model != embedder.model() {
            tracing::warn!(
                "Index was built with {} but queries will be embedded with {}",
                manifest.embedding_model,
                embedder.model()
            );
        }

        let backend: Box<dyn RetrievalBackend> = match config.retrieval.backend {
            BackendKind::Flat => {
                if manifest.flat_index_path.is_none() {
                    return Err(Error::missing_artifact(
                        layout.flat_index(),
                        "the last build skipped the flat index; rerun the index command with --target flat",
                    ));
                }
                let index = FlatIndex::load(&layout.flat_index())?;
                if index.dimension() != manifest.dimension {
                    return Err(Error::dimension_mismatch(
                        "flat index",
                        manifest.dimension,
                        index.dimension(),
                    ));
                }
                let chunks = ChunkStore::new(config.paths.chunks_file()).read_all()?;
                Box::new(ExactFlatIndex::new(index, chunks, embedder)?)
            }
            BackendKind::Collection => {
                if manifest.collection_path.is_none() {
                    return Err(Error::missing_artifact(
                        layout.collection(),
                        "the last build skipped the collection; rerun the index command with --target collection",
                    ));
                }
                let collection = ChunkCollection::open_existing(&layout.collection())?;
                if let Some(dimension) = collection.dimension()? {
                    if dimension != manifest.dimension {
                        return Err(Error::dimension_mismatch(
                            "collection",
                            manifest.dimension,
                            dimension,
                        ));
                    }
                }
                Box::new(FilterableCollectionIndex::new(collection, embedder))
            }
        };

        let len = backend.len()?;
        if len != manifest.total_chunks {
            return Err(Error::storage(format!(
                "{} backend holds {} chunks but the manifest records {}; rebuild the index",
                backend.name(),
                len,
                manifest.total_chunks
            )));
        }

        tracing::info!(
            "Loaded {} backend with {} chunks ({} dimensions)",
            backend.name(),
            len,
            manifest.dimension
        );

        Ok(Self::new(
            backend,
            config.retrieval.top_k,
            config.retrieval.filter_policy,
        ))
    }

    pub fn backend(&self) -> &dyn RetrievalBackend {
        self.backend.as_ref()
    }

    pub fn default_top_k(&self) -> usize {
        self.default_top_k
    }

    /// Top chunks for `query`; `top_k` of `None` uses the configured default
    pub async fn retrieve(
        &self,
        query: &str,
        filters: Option<&MetadataFilter>,
        top_k: Option<usize>,
    ) -> Result<Vec<RetrievalResult>> {
        let k = top_k.unwrap_or(self.default_top_k);
        if k == 0 {
            return Err(Error::InvalidQuery("top_k must be at least 1".to_string()));
        }

        let filters = filters.filter(|f| !f.is_empty());
        let filters = match filters {
            Some(f) if !self.backend.supports_metadata_filter() => match self.filter_policy {
                FilterPolicy::WarnAndIgnore => {
                    tracing::warn!(
                        "Backend '{}' cannot apply {} metadata filter(s); searching unfiltered",
                        self.backend.name(),
                        f.len()
                    );
                    None
                }
                FilterPolicy::Reject => {
                    return Err(Error::UnsupportedFilter {
                        backend: self.backend.name().to_string(),
                    });
                }
            },
            other => other,
        };

        let results = self.backend.search(query, filters, k).await?;
        tracing::debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// Prompt context for `results`
    pub fn format_context(&self, results: &[RetrievalResult]) -> String {
        PromptBuilder::build_context(results)
    }

    /// One citation per result, in result order
    pub fn get_sources(&self, results: &[RetrievalResult]) -> Vec<Source> {
        results
            .iter()
            .map(|r| Source::from_metadata(&r.metadata))
            .collect()
    }
}
