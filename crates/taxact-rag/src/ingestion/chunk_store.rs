//! Chunk persistence (JSONL), parsed-document loading, and the chunking report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::{Chunk, ParsedDocument};

const PARSED_SUFFIX: &str = "_parsed.json";

/// Line-delimited JSON file of chunks
pub struct ChunkStore {
    path: PathBuf,
}

impl ChunkStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replace the file with `chunks`, one JSON object per line
    pub fn write_all(&self, chunks: &[Chunk]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut writer = BufWriter::new(fs::File::create(&self.path)?);
        for chunk in chunks {
            serde_json::to_writer(&mut writer, chunk)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        tracing::info!("Saved {} chunks to {}", chunks.len(), self.path.display());
        Ok(())
    }

    /// Read every chunk, skipping blank lines
    pub fn read_all(&self) -> Result<Vec<Chunk>> {
        if !self.exists() {
            return Err(Error::missing_artifact(
                &self.path,
                "run the chunk command to create it",
            ));
        }

        let reader = BufReader::new(fs::File::open(&self.path)?);
        let mut chunks = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line).map_err(|e| {
                Error::Corpus(format!(
                    "{} line {}: {}",
                    self.path.display(),
                    line_no + 1,
                    e
                ))
            })?;
            chunks.push(chunk);
        }

        Ok(chunks)
    }
}

/// Load every `*_parsed.json` file in `dir`, ordered by filename
pub fn load_parsed_documents(dir: &Path) -> Result<Vec<ParsedDocument>> {
    if !dir.is_dir() {
        return Err(Error::Corpus(format!(
            "processed directory {} does not exist",
            dir.display()
        )));
    }

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(PARSED_SUFFIX))
        })
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(Error::Corpus(format!(
            "no *{} files in {}",
            PARSED_SUFFIX,
            dir.display()
        )));
    }

    let mut docs = Vec::with_capacity(paths.len());
    for path in paths {
        let raw = fs::read_to_string(&path)?;
        let doc: ParsedDocument = serde_json::from_str(&raw)
            .map_err(|e| Error::Corpus(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded {} ({} sections)", doc.filename, doc.sections.len());
        docs.push(doc);
    }

    Ok(docs)
}

/// Result of checking chunks for required fields and minimum length
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub total_chunks: usize,
    pub valid_chunks: usize,
    pub invalid_chunks: usize,
    pub issues: Vec<String>,
}

impl ValidationReport {
    pub fn validate(chunks: &[Chunk], min_chunk_size: usize) -> Self {
        let mut report = Self {
            total_chunks: chunks.len(),
            ..Default::default()
        };

        for (i, chunk) in chunks.iter().enumerate() {
            let mut problems = Vec::new();

            if chunk.text.trim().is_empty() {
                problems.push("missing text");
            }
            if chunk.document_name.is_empty() {
                problems.push("missing document_name");
            }
            if chunk.section_number.is_empty() {
                problems.push("missing section_number");
            }
            if chunk.section_title.is_empty() {
                problems.push("missing section_title");
            }
            if chunk.char_count < min_chunk_size {
                problems.push("text too short");
            }

            if problems.is_empty() {
                report.valid_chunks += 1;
            } else {
                report.invalid_chunks += 1;
                report
                    .issues
                    .push(format!("Chunk {}: {}", i, problems.join(", ")));
            }
        }

        report
    }
}

/// Counts of chunks carrying each content feature
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeatureStatistics {
    pub with_definitions: usize,
    pub with_rates: usize,
    pub with_dates: usize,
    pub with_amounts: usize,
    pub with_uncertainties: usize,
}

impl FeatureStatistics {
    pub fn collect(chunks: &[Chunk]) -> Self {
        let count = |f: fn(&Chunk) -> bool| chunks.iter().filter(|c| f(c)).count();
        Self {
            with_definitions: count(|c| c.contains_definition),
            with_rates: count(|c| c.contains_rate),
            with_dates: count(|c| c.contains_date),
            with_amounts: count(|c| c.contains_amount),
            with_uncertainties: count(|c| !c.uncertainty_notes.is_empty()),
        }
    }
}

/// Summary of one chunking run (`chunks_metadata.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRunReport {
    pub created_at: DateTime<Utc>,
    pub total_chunks: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub duplicates_removed: usize,
    pub validation: ValidationReport,
    pub statistics: FeatureStatistics,
}

impl ChunkRunReport {
    pub fn new(chunks: &[Chunk], config: &ChunkingConfig, duplicates_removed: usize) -> Self {
        Self {
            created_at: Utc::now(),
            total_chunks: chunks.len(),
            chunk_size: config.chunk_size,
            chunk_overlap: config.chunk_overlap,
            duplicates_removed,
            validation: ValidationReport::validate(chunks, config.min_chunk_size),
            statistics: FeatureStatistics::collect(chunks),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|_| Error::missing_artifact(path, "run the chunk command to create it"))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
