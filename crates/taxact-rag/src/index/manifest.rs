//! Artifact layout and build manifest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// File names of the index artifacts under one directory
#[derive(Debug, Clone)]
pub struct IndexLayout {
    dir: PathBuf,
}

impl IndexLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn flat_index(&self) -> PathBuf {
        self.dir.join("flat_index.bin")
    }

    pub fn embeddings(&self) -> PathBuf {
        self.dir.join("embeddings.npy")
    }

    pub fn chunk_metadata(&self) -> PathBuf {
        self.dir.join("chunk_metadata.json")
    }

    pub fn collection(&self) -> PathBuf {
        self.dir.join("collection.sqlite")
    }

    pub fn manifest(&self) -> PathBuf {
        self.dir.join("index_manifest.json")
    }
}

/// Description of one index build (`index_manifest.json`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub total_chunks: usize,
    #[serde(default)]
    pub flat_index_path: Option<PathBuf>,
    pub embeddings_path: PathBuf,
    pub metadata_path: PathBuf,
    #[serde(default)]
    pub collection_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
    /// Embedding batches replaced by zero vectors after a provider failure
    #[serde(default)]
    pub degraded_batches: usize,
}

impl IndexManifest {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::missing_artifact(path, "run the index command to build it"));
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
