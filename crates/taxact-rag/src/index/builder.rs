//! Batch embedding and index artifact construction

use chrono::Utc;
use std::fs;
use std::sync::Arc;

use super::collection::ChunkCollection;
use super::flat::FlatIndex;
use super::manifest::{IndexLayout, IndexManifest};
use crate::error::{Error, Result};
use crate::providers::EmbeddingProvider;
use crate::types::{Chunk, ChunkMetadataRecord};

/// Which backends a build produces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildTargets {
    Flat,
    Collection,
    #[default]
    Both,
}

impl BuildTargets {
    pub fn flat(&self) -> bool {
        matches!(self, Self::Flat | Self::Both)
    }

    pub fn collection(&self) -> bool {
        matches!(self, Self::Collection | Self::Both)
    }
}

/// One embedding per chunk, all of the same dimension
#[derive(Debug, Clone)]
pub struct EmbeddingSet {
    pub vectors: Vec<Vec<f32>>,
    pub dimension: usize,
    /// Batches that failed and were filled with zero vectors
    pub degraded_batches: usize,
}

/// Result of a completed build
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub manifest: IndexManifest,
    pub embeddings: EmbeddingSet,
}

/// Embeds chunks and writes the index artifacts
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    layout: IndexLayout,
    batch_size: usize,
    targets: BuildTargets,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, layout: IndexLayout) -> Self {
        Self {
            embedder,
            layout,
            batch_size: 100,
            targets: BuildTargets::default(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_targets(mut self, targets: BuildTargets) -> Self {
        self.targets = targets;
        self
    }

    /// Embed chunk texts batch by batch
    ///
    /// A failed batch yields zero vectors for each of its chunks, so the
    /// output always has one vector per chunk. Successful batches must agree
    /// on dimension.
    pub async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<EmbeddingSet> {
        let mut batches: Vec<(usize, Option<Vec<Vec<f32>>>)> = Vec::new();
        let mut dimension: Option<usize> = None;
        let mut degraded_batches = 0usize;
        let total_batches = chunks.len().div_ceil(self.batch_size);

        for (batch_no, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            tracing::debug!("Embedding batch {}/{}", batch_no + 1, total_batches);

            let vectors = match self.embedder.embed_batch(&texts).await {
                Ok(vectors) if vectors.len() == texts.len() => Some(vectors),
                Ok(vectors) => {
                    tracing::warn!(
                        "Batch {} returned {} embeddings for {} texts; using zero vectors",
                        batch_no,
                        vectors.len(),
                        texts.len()
                    );
                    None
                }
                Err(e) => {
                    tracing::warn!("Batch {} failed: {}; using zero vectors", batch_no, e);
                    None
                }
            };

            match &vectors {
                Some(vectors) => {
                    for v in vectors {
                        match dimension {
                            None => dimension = Some(v.len()),
                            Some(d) if d != v.len() => {
                                return Err(Error::dimension_mismatch(
                                    format!("embedding batch {}", batch_no),
                                    d,
                                    v.len(),
                                ));
                            }
                            Some(_) => {}
                        }
                    }
                }
                None => degraded_batches += 1,
            }

            batches.push((batch.len(), vectors));
        }

        let dimension = dimension.unwrap_or_else(|| {
            tracing::warn!(
                "No embedding batch succeeded; assuming {} dimensions",
                self.embedder.dimensions()
            );
            self.embedder.dimensions()
        });

        let vectors = batches
            .into_iter()
            .flat_map(|(len, vectors)| {
                vectors.unwrap_or_else(|| vec![vec![0.0; dimension]; len])
            })
            .collect();

        Ok(EmbeddingSet {
            vectors,
            dimension,
            degraded_batches,
        })
    }

    /// Embed `chunks` and write every selected artifact
    pub async fn build(&self, chunks: &[Chunk]) -> Result<BuildOutput> {
        if chunks.is_empty() {
            return Err(Error::Corpus("no chunks to index".to_string()));
        }

        tracing::info!(
            "Building index for {} chunks with {} ({})",
            chunks.len(),
            self.embedder.model(),
            self.embedder.name()
        );

        let embeddings = self.embed_chunks(chunks).await?;
        fs::create_dir_all(self.layout.dir())?;

        let index = FlatIndex::from_rows(&embeddings.vectors, embeddings.dimension)?;
        ndarray_npy::write_npy(self.layout.embeddings(), index.vectors())?;

        let records: Vec<ChunkMetadataRecord> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| c.metadata_record(i))
            .collect();
        fs::write(
            self.layout.chunk_metadata(),
            serde_json::to_string_pretty(&records)?,
        )?;

        let flat_index_path = if self.targets.flat() {
            let path = self.layout.flat_index();
            index.save(&path)?;
            tracing::info!("Saved flat index ({} vectors) to {}", index.len(), path.display());
            Some(path)
        } else {
            remove_stale(&self.layout.flat_index())?;
            None
        };

        let collection_path = if self.targets.collection() {
            let path = self.layout.collection();
            self.write_collection(&path, chunks, &embeddings)?;
            Some(path)
        } else {
            remove_stale(&self.layout.collection())?;
            None
        };

        let manifest = IndexManifest {
            embedding_model: self.embedder.model().to_string(),
            dimension: embeddings.dimension,
            total_chunks: chunks.len(),
            flat_index_path,
            embeddings_path: self.layout.embeddings(),
            metadata_path: self.layout.chunk_metadata(),
            collection_path,
            created_at: Utc::now(),
            degraded_batches: embeddings.degraded_batches,
        };
        manifest.save(&self.layout.manifest())?;

        if embeddings.degraded_batches > 0 {
            tracing::warn!(
                "{} embedding batches degraded to zero vectors",
                embeddings.degraded_batches
            );
        }

        Ok(BuildOutput {
            manifest,
            embeddings,
        })
    }

    fn write_collection(
        &self,
        path: &std::path::Path,
        chunks: &[Chunk],
        embeddings: &EmbeddingSet,
    ) -> Result<()> {
        let collection = ChunkCollection::open(path)?;
        collection.clear()?;
        collection.set_embedding_info(self.embedder.model(), embeddings.dimension)?;

        for (batch_no, (chunk_batch, vector_batch)) in chunks
            .chunks(self.batch_size)
            .zip(embeddings.vectors.chunks(self.batch_size))
            .enumerate()
        {
            collection.insert_batch(batch_no * self.batch_size, chunk_batch, vector_batch)?;
        }

        tracing::info!(
            "Saved collection ({} chunks) to {}",
            collection.count()?,
            path.display()
        );
        Ok(())
    }
}

/// Delete an artifact left by an earlier build that this build does not replace
fn remove_stale(path: &std::path::Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path)?;
        tracing::info!("Removed stale artifact {}", path.display());
    }
    Ok(())
}
