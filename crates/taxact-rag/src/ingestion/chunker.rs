//! Section-aware chunking with sentence overlap and duplicate suppression

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use super::features::ChunkFeatures;
use crate::config::ChunkingConfig;
use crate::types::{Chunk, DocumentContext, ParsedDocument, Section};

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").expect("Invalid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex"));
static NON_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w\s.,;:!?\-()]").expect("Invalid regex"));

/// Fingerprints already emitted in one chunking run
///
/// The caller owns the context and decides its scope: one context across a
/// corpus deduplicates across documents, a fresh context per document does not.
#[derive(Debug, Default)]
pub struct DedupContext {
    seen: HashSet<String>,
    duplicates_dropped: usize,
}

impl DedupContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fingerprint, returning false if it was already seen
    pub fn insert(&mut self, fingerprint: &str) -> bool {
        if self.seen.contains(fingerprint) {
            self.duplicates_dropped += 1;
            return false;
        }
        self.seen.insert(fingerprint.to_string());
        true
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Number of chunks suppressed as duplicates so far
    pub fn duplicates_dropped(&self) -> usize {
        self.duplicates_dropped
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Forget everything seen so far
    pub fn reset(&mut self) {
        self.seen.clear();
        self.duplicates_dropped = 0;
    }
}

/// Splits sections into overlapping, sentence-aligned chunks
pub struct SectionChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap carried into the next chunk, in characters
    overlap: usize,
    /// Sections and chunks shorter than this are dropped
    min_size: usize,
}

impl SectionChunker {
    /// Create a chunker with the default minimum size
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            min_size: ChunkingConfig::default().min_chunk_size,
        }
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap).with_min_size(config.min_chunk_size)
    }

    /// Chunk one section, skipping fingerprints already in `dedup`
    pub fn chunk_section(
        &self,
        section: &Section,
        doc: &DocumentContext,
        dedup: &mut DedupContext,
    ) -> Vec<Chunk> {
        let content = section.content.trim();
        if char_len(content) < self.min_size {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_size = 0usize;

        for sentence in split_into_sentences(content) {
            let sentence_len = char_len(sentence);

            if !current.is_empty() && current_size + sentence_len > self.chunk_size {
                self.emit(&current, section, doc, dedup, &mut chunks);

                current = self.overlap_tail(&current);
                current_size = current.iter().map(|s| char_len(s)).sum();
            }

            current.push(sentence);
            current_size += sentence_len;
        }

        if !current.is_empty() {
            self.emit(&current, section, doc, dedup, &mut chunks);
        }

        chunks
    }

    /// Chunk every section of a parsed document
    ///
    /// Documents without detected sections are chunked as a single
    /// whole-document pseudo-section built from their page text.
    pub fn chunk_document(&self, parsed: &ParsedDocument, dedup: &mut DedupContext) -> Vec<Chunk> {
        let doc = parsed.context();

        let chunks: Vec<Chunk> = if parsed.sections.is_empty() {
            match parsed.pseudo_section() {
                Some(section) => {
                    tracing::debug!(
                        "No sections in {}, chunking full document text",
                        parsed.filename
                    );
                    self.chunk_section(&section, &doc, dedup)
                }
                None => {
                    tracing::warn!("No sections or page text in {}", parsed.filename);
                    Vec::new()
                }
            }
        } else {
            parsed
                .sections
                .iter()
                .flat_map(|section| self.chunk_section(section, &doc, dedup))
                .collect()
        };

        tracing::info!("Created {} chunks from {}", chunks.len(), parsed.filename);
        chunks
    }

    /// Chunk a batch of documents through one shared dedup context
    pub fn chunk_corpus(&self, docs: &[ParsedDocument], dedup: &mut DedupContext) -> Vec<Chunk> {
        docs.iter()
            .flat_map(|doc| self.chunk_document(doc, dedup))
            .collect()
    }

    /// Trailing whole sentences whose total length fits within the overlap
    fn overlap_tail<'a>(&self, sentences: &[&'a str]) -> Vec<&'a str> {
        let mut tail = Vec::new();
        let mut size = 0usize;

        for sentence in sentences.iter().rev() {
            size += char_len(sentence);
            if size > self.overlap {
                break;
            }
            tail.push(*sentence);
        }

        tail.reverse();
        tail
    }

    fn emit(
        &self,
        sentences: &[&str],
        section: &Section,
        doc: &DocumentContext,
        dedup: &mut DedupContext,
        out: &mut Vec<Chunk>,
    ) {
        let text = sentences.join(" ");
        let char_count = char_len(&text);
        if char_count < self.min_size {
            return;
        }

        let fingerprint = fingerprint(&text);
        if !dedup.insert(&fingerprint) {
            tracing::debug!(
                "Dropping duplicate chunk from {} section {}",
                doc.document_name,
                section.number
            );
            return;
        }

        let features = ChunkFeatures::detect(&text);

        out.push(Chunk {
            word_count: text.split_whitespace().count(),
            char_count,
            text,
            document_name: doc.document_name.clone(),
            document_type: doc.document_type.clone(),
            section_type: section.section_type,
            section_number: section.number.clone(),
            section_title: section.title.clone(),
            page_start: section.page_start,
            page_end: section.page_end,
            fingerprint,
            contains_definition: features.contains_definition,
            contains_rate: features.contains_rate,
            contains_date: features.contains_date,
            contains_amount: features.contains_amount,
            uncertainty_notes: features.uncertainty_notes,
        });
    }
}

/// Split on `.`, `!` or `?` followed by whitespace and an uppercase letter
///
/// Returned sentences are trimmed and never empty.
pub fn split_into_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0usize;

    for m in SENTENCE_END.find_iter(text) {
        let starts_upper = text[m.end()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_uppercase());
        if !starts_upper {
            continue;
        }

        // terminator is a single ASCII byte
        let sentence = text[start..m.start() + 1].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Canonical form used for fingerprinting
pub fn normalize_text(text: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let stripped = NON_TEXT.replace_all(&collapsed, "");
    stripped.trim().to_lowercase()
}

/// SHA-256 hex digest of the normalized text
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_text(text).as_bytes());
    hex::encode(hasher.finalize())
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PageText, ParsedMetadata, SectionType};
    use proptest::prelude::*;

    fn vat_section(content: &str) -> Section {
        Section::new(SectionType::Section, "12", "Rate of tax", (4, 5), content)
    }

    fn doc() -> DocumentContext {
        DocumentContext::primary_legislation("VAT Act 2025")
    }

    fn numbered_sentences(n: usize) -> String {
        (0..n)
            .map(|i| format!("Sentence number {} describes a distinct taxable supply rule.", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_sentence_split_requires_uppercase_start() {
        let sentences = split_into_sentences("Rate is 7.5 per cent. See s. 12 below. Done!  Next?");
        assert_eq!(sentences, vec!["Rate is 7.5 per cent.", "See s. 12 below.", "Done!", "Next?"]);
    }

    #[test]
    fn test_short_section_yields_nothing() {
        let chunker = SectionChunker::new(800, 200);
        let mut dedup = DedupContext::new();
        let chunks = chunker.chunk_section(&vat_section("Too short."), &doc(), &mut dedup);
        assert!(chunks.is_empty());
        assert!(dedup.is_empty());
    }

    #[test]
    fn test_single_chunk_carries_section_metadata() {
        let content = "The rate of tax shall be 7.5% of the value of all taxable goods and services. \
                       Commencement is 1 January 2026.";
        let chunker = SectionChunker::new(800, 200);
        let mut dedup = DedupContext::new();
        let chunks = chunker.chunk_section(&vat_section(content), &doc(), &mut dedup);

        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.text, content.split_whitespace().collect::<Vec<_>>().join(" "));
        assert_eq!(chunk.section_number, "12");
        assert_eq!(chunk.page_start, 4);
        assert_eq!(chunk.document_type, "primary_legislation");
        assert!(chunk.contains_rate);
        assert!(chunk.contains_date);
        assert!(!chunk.contains_amount);
        assert_eq!(chunk.char_count, chunk.text.chars().count());
    }

    #[test]
    fn test_chunks_overlap_by_whole_sentences() {
        let chunker = SectionChunker::new(200, 80);
        let mut dedup = DedupContext::new();
        let chunks = chunker.chunk_section(&vat_section(&numbered_sentences(12)), &doc(), &mut dedup);

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev = split_into_sentences(&pair[0].text);
            let next = split_into_sentences(&pair[1].text);
            assert_eq!(prev.last(), next.first());
        }
    }

    #[test]
    fn test_dedup_within_one_context() {
        let chunker = SectionChunker::new(800, 200);
        let section = vat_section(&numbered_sentences(2));
        let mut dedup = DedupContext::new();

        let first = chunker.chunk_section(&section, &doc(), &mut dedup);
        let second = chunker.chunk_section(&section, &doc(), &mut dedup);

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(dedup.duplicates_dropped(), 1);
    }

    #[test]
    fn test_short_trailing_chunk_is_dropped_without_fingerprint() {
        let chunker = SectionChunker::new(200, 0).with_min_size(100);
        let mut dedup = DedupContext::new();

        // Three sentences fill the first chunk; the fourth is left alone and too short
        let chunks = chunker.chunk_section(&vat_section(&numbered_sentences(4)), &doc(), &mut dedup);
        assert_eq!(chunks.len(), 1);
        assert!(!chunks[0].text.contains("number 3"));
        assert_eq!(dedup.len(), 1);
        assert_eq!(dedup.duplicates_dropped(), 0);

        let tail = "Sentence number 3 describes a distinct taxable supply rule.";
        let lenient = SectionChunker::new(200, 0).with_min_size(40);
        let chunks = lenient.chunk_section(&vat_section(tail), &doc(), &mut dedup);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, tail);
        assert_eq!(dedup.len(), 2);
        assert_eq!(dedup.duplicates_dropped(), 0);
    }

    #[test]
    fn test_fresh_contexts_are_independent() {
        let chunker = SectionChunker::new(800, 200);
        let section = vat_section(&numbered_sentences(2));

        let a = chunker.chunk_section(&section, &doc(), &mut DedupContext::new());
        let b = chunker.chunk_section(&section, &doc(), &mut DedupContext::new());
        assert_eq!(a, b);

        let mut dedup = DedupContext::new();
        chunker.chunk_section(&section, &doc(), &mut dedup);
        dedup.reset();
        assert_eq!(chunker.chunk_section(&section, &doc(), &mut dedup).len(), 1);
    }

    #[test]
    fn test_fingerprint_ignores_case_and_spacing() {
        assert_eq!(
            fingerprint("The  Rate of TAX\nis 7.5%."),
            fingerprint("the rate of tax is 7.5.")
        );
        assert_ne!(fingerprint("rate is 5"), fingerprint("rate is 7"));
        assert_eq!(fingerprint("x").len(), 64);
    }

    #[test]
    fn test_document_without_sections_uses_page_text() {
        let parsed = ParsedDocument {
            filename: "Finance Act.pdf".to_string(),
            metadata: ParsedMetadata { title: None },
            sections: Vec::new(),
            pages: vec![
                PageText { page_number: 1, text: numbered_sentences(2) },
                PageText { page_number: 2, text: String::new() },
            ],
        };

        let chunks = SectionChunker::new(800, 200).chunk_document(&parsed, &mut DedupContext::new());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].section_type, SectionType::FullDocument);
        assert_eq!(chunks[0].section_title, "Document");
        assert_eq!((chunks[0].page_start, chunks[0].page_end), (1, 2));
    }

    #[test]
    fn test_corpus_dedups_across_documents() {
        let section = vat_section(&numbered_sentences(3));
        let parsed = |name: &str| ParsedDocument {
            filename: name.to_string(),
            metadata: ParsedMetadata::default(),
            sections: vec![section.clone()],
            pages: Vec::new(),
        };

        let chunker = SectionChunker::new(800, 200);
        let mut dedup = DedupContext::new();
        let chunks = chunker.chunk_corpus(&[parsed("a.pdf"), parsed("b.pdf")], &mut dedup);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].document_name, "a.pdf");
        assert_eq!(dedup.duplicates_dropped(), 1);
    }

    proptest! {
        #[test]
        fn prop_chunks_bounded_and_overlapping(
            lengths in prop::collection::vec(20usize..120, 1..40),
            chunk_size in 300usize..900,
        ) {
            let overlap = 150usize;
            let content = lengths
                .iter()
                .enumerate()
                .map(|(i, len)| format!("S{} {}.", i, "x".repeat(*len)))
                .collect::<Vec<_>>()
                .join(" ");

            let chunker = SectionChunker::new(chunk_size, overlap);
            let chunks = chunker.chunk_section(&vat_section(&content), &doc(), &mut DedupContext::new());

            for (i, chunk) in chunks.iter().enumerate() {
                let sentences = split_into_sentences(&chunk.text);
                let longest = sentences.iter().map(|s| s.chars().count()).max().unwrap_or(0);
                prop_assert!(chunk.char_count <= chunk_size + longest + sentences.len());

                if i > 0 {
                    let prev = split_into_sentences(&chunks[i - 1].text);
                    let start = prev.iter().position(|s| Some(s) == sentences.first());
                    prop_assert!(start.is_some());
                    let shared = &prev[start.unwrap_or(0)..];
                    prop_assert_eq!(shared, &sentences[..shared.len()]);
                }
            }
        }
    }
}
