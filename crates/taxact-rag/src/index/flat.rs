//! Exact (brute-force) L2 index over a dense embedding matrix

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// Row-major matrix of embeddings; row `i` is chunk ordinal `i`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlatIndex {
    vectors: Array2<f32>,
}

impl FlatIndex {
    /// Empty index of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Array2::zeros((0, dimension)),
        }
    }

    pub fn from_matrix(vectors: Array2<f32>) -> Self {
        Self { vectors }
    }

    /// Build from equal-length rows
    pub fn from_rows(rows: &[Vec<f32>], dimension: usize) -> Result<Self> {
        let mut data = Vec::with_capacity(rows.len() * dimension);
        for row in rows {
            if row.len() != dimension {
                return Err(Error::dimension_mismatch("flat index row", dimension, row.len()));
            }
            data.extend_from_slice(row);
        }

        let vectors = Array2::from_shape_vec((rows.len(), dimension), data)
            .map_err(|e| Error::storage(e.to_string()))?;
        Ok(Self { vectors })
    }

    pub fn dimension(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn len(&self) -> usize {
        self.vectors.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vectors(&self) -> &Array2<f32> {
        &self.vectors
    }

    /// The `k` nearest rows as `(ordinal, squared L2 distance)`, closest first
    ///
    /// Equal distances keep ordinal order. `k` larger than the index returns
    /// every row.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension() {
            return Err(Error::dimension_mismatch(
                "flat index query",
                self.dimension(),
                query.len(),
            ));
        }

        let query = ArrayView1::from(query);
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let diff = &row - &query;
                (i, diff.dot(&diff))
            })
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Write the index with bincode
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::Serialization(e.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::missing_artifact(path, "run the index command to build it"));
        }
        let bytes = fs::read(path)?;
        let (index, _): (Self, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(index)
    }
}
