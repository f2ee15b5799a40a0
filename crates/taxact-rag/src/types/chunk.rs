//! Chunk types with structural and content metadata for citations

use serde::{Deserialize, Serialize};

use super::section::SectionType;

/// A retrievable passage of a legal document
///
/// Serialized field names match the chunk store format (`chunks.jsonl`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub document_name: String,
    pub document_type: String,
    pub section_type: SectionType,
    pub section_number: String,
    pub section_title: String,
    pub page_start: u32,
    pub page_end: u32,
    pub char_count: usize,
    pub word_count: usize,
    /// Fingerprint of the normalized text
    #[serde(rename = "hash")]
    pub fingerprint: String,
    pub contains_definition: bool,
    pub contains_rate: bool,
    pub contains_date: bool,
    pub contains_amount: bool,
    #[serde(default)]
    pub uncertainty_notes: Vec<String>,
}

impl Chunk {
    /// Metadata stored alongside the embedding in the filterable collection
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            document_name: self.document_name.clone(),
            section_type: self.section_type,
            section_number: self.section_number.clone(),
            section_title: self.section_title.clone(),
            page_start: self.page_start,
            page_end: self.page_end,
            contains_definition: self.contains_definition,
            contains_rate: self.contains_rate,
            contains_date: self.contains_date,
            contains_amount: self.contains_amount,
        }
    }

    /// Compact record for `chunk_metadata.json` (text excluded)
    pub fn metadata_record(&self, ordinal: usize) -> ChunkMetadataRecord {
        ChunkMetadataRecord {
            chunk_id: ordinal,
            document_name: self.document_name.clone(),
            section_type: self.section_type,
            section_number: self.section_number.clone(),
            section_title: self.section_title.clone(),
            page_start: self.page_start,
            page_end: self.page_end,
            char_count: self.char_count,
            word_count: self.word_count,
            contains_definition: self.contains_definition,
            contains_rate: self.contains_rate,
            contains_date: self.contains_date,
            contains_amount: self.contains_amount,
            uncertainty_notes: self.uncertainty_notes.clone(),
        }
    }
}

/// Filterable per-chunk metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub document_name: String,
    pub section_type: SectionType,
    pub section_number: String,
    pub section_title: String,
    pub page_start: u32,
    pub page_end: u32,
    pub contains_definition: bool,
    pub contains_rate: bool,
    pub contains_date: bool,
    pub contains_amount: bool,
}

/// Entry of the compact metadata artifact
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadataRecord {
    pub chunk_id: usize,
    pub document_name: String,
    pub section_type: SectionType,
    pub section_number: String,
    pub section_title: String,
    pub page_start: u32,
    pub page_end: u32,
    pub char_count: usize,
    pub word_count: usize,
    pub contains_definition: bool,
    pub contains_rate: bool,
    pub contains_date: bool,
    pub contains_amount: bool,
    pub uncertainty_notes: Vec<String>,
}
