//! Sections and parsed documents produced by the extraction stage

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Structural kind of a legal-document section
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Part,
    Chapter,
    Section,
    Article,
    Schedule,
    /// Pseudo-section covering a whole document without detected structure
    FullDocument,
    #[default]
    #[serde(other)]
    Other,
}

impl SectionType {
    /// Stable lowercase name, also used as the stored metadata value
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Part => "part",
            Self::Chapter => "chapter",
            Self::Section => "section",
            Self::Article => "article",
            Self::Schedule => "schedule",
            Self::FullDocument => "full_document",
            Self::Other => "other",
        }
    }

    /// Parse a stored metadata value
    pub fn from_name(name: &str) -> Self {
        match name {
            "part" => Self::Part,
            "chapter" => Self::Chapter,
            "section" => Self::Section,
            "article" => Self::Article,
            "schedule" => Self::Schedule,
            "full_document" => Self::FullDocument,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structural unit of a source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    #[serde(rename = "type", default)]
    pub section_type: SectionType,
    /// Section number as printed ("12", "IV", or empty)
    #[serde(default, deserialize_with = "string_or_number")]
    pub number: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub page_start: u32,
    #[serde(default)]
    pub page_end: u32,
    #[serde(default)]
    pub content: String,
}

impl Section {
    /// Create a section
    pub fn new(
        section_type: SectionType,
        number: impl Into<String>,
        title: impl Into<String>,
        pages: (u32, u32),
        content: impl Into<String>,
    ) -> Self {
        Self {
            section_type,
            number: number.into(),
            title: title.into(),
            page_start: pages.0,
            page_end: pages.1,
            content: content.into(),
        }
    }
}

/// Document-level context attached to every chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DocumentContext {
    pub document_name: String,
    pub document_type: String,
}

impl DocumentContext {
    /// Context for a primary legislation document
    pub fn primary_legislation(document_name: impl Into<String>) -> Self {
        Self {
            document_name: document_name.into(),
            document_type: "primary_legislation".to_string(),
        }
    }
}

/// Text of one extracted page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: u32,
    #[serde(default)]
    pub text: String,
}

/// Metadata block of an extraction result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedMetadata {
    #[serde(default)]
    pub title: Option<String>,
}

/// Output of the extraction stage for one source file (`*_parsed.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub filename: String,
    #[serde(default)]
    pub metadata: ParsedMetadata,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub pages: Vec<PageText>,
}

impl ParsedDocument {
    /// Document context for chunks of this file
    pub fn context(&self) -> DocumentContext {
        DocumentContext::primary_legislation(self.filename.clone())
    }

    /// Whole-document pseudo-section used when no sections were detected
    ///
    /// Returns `None` when the pages carry no text either.
    pub fn pseudo_section(&self) -> Option<Section> {
        let full_text = self
            .pages
            .iter()
            .map(|p| p.text.as_str())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if full_text.is_empty() {
            return None;
        }

        let title = self
            .metadata
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Document".to_string());

        Some(Section::new(
            SectionType::FullDocument,
            "",
            title,
            (1, self.pages.len() as u32),
            full_text,
        ))
    }
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}
