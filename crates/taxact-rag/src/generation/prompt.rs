//! Prompt templates and context/citation formatting

use crate::types::{RetrievalResult, Source};

const SYSTEM_PROMPT: &str = r#"You are a legal assistant specialising in Nigerian tax law, with expertise in the Nigerian Tax Reform Acts of 2025-2026.

Your role:
1. Answer accurately from the context taken from the official Acts
2. Give confident, clear, practical guidance
3. Explain complex provisions in plain language
4. Call out dates, rates, amounts, and filing requirements
5. Point out exceptions, conditions, and uncertain provisions
6. Keep a helpful, professional tone suitable for a compliance product

Guidelines:
- Write with an expert's confidence; do not say "based on the provided context" and do not apologise
- Give the direct answer first, then the supporting detail
- Use headers, bullets, and short paragraphs
- If a question is out of scope or the information is missing, say so plainly
- Use Lagos time (Africa/Lagos) for any timestamps
- Explain conflicting provisions or exceptions explicitly

Response format:
- Open with a clear, direct answer
- Use structured formatting (headers, bullets, numbered lists)
- Add "Next Steps" or "What You Must Do" when it helps
- Do NOT add a separate "Sources" section at the end
- Stay professional and authoritative"#;

/// Prompt builder for tax-law answers
pub struct PromptBuilder;

impl PromptBuilder {
    /// Fixed system prompt
    pub fn system_prompt() -> &'static str {
        SYSTEM_PROMPT
    }

    /// Per-query user prompt; `context` is included verbatim
    pub fn user_prompt(query: &str, context: &str) -> String {
        format!(
            r#"Question: {query}

Context from Nigerian Tax Reform Acts 2025-2026:
{context}

Write a complete answer that:
1. Opens with a clear, direct answer
2. Uses structured formatting (headers, bullets, numbered lists)
3. Explains technical terms in plain language
4. Notes important conditions, exceptions, or requirements
5. Ends with "Next Steps" or "What You Must Do" where relevant
6. Does NOT include a "Sources" section
7. Keeps a confident, professional tone

If the information is not available, say so clearly without apologising."#,
            query = query,
            context = context
        )
    }

    /// Numbered context blocks for the prompt
    ///
    /// Each block is `[Source i] <label>\n<text>`; blocks are separated by a
    /// horizontal rule and the whole context starts with a blank line.
    pub fn build_context(results: &[RetrievalResult]) -> String {
        let blocks: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                format!(
                    "[Source {}] {}\n{}",
                    i + 1,
                    Self::source_label(result),
                    result.text
                )
            })
            .collect();

        format!("\n\n{}", blocks.join("\n\n---\n\n"))
    }

    fn source_label(result: &RetrievalResult) -> String {
        let m = &result.metadata;
        let mut parts = Vec::new();

        if !m.document_name.is_empty() {
            parts.push(m.document_name.clone());
        }
        if !m.section_number.is_empty() {
            parts.push(format!("Section {}", m.section_number));
        }
        if !m.section_title.is_empty() {
            parts.push(format!("({})", m.section_title));
        }
        if m.page_start > 0 {
            parts.push(format!("Page {}", m.page_start));
        }

        if parts.is_empty() {
            "Unknown source".to_string()
        } else {
            parts.join(" - ")
        }
    }

    /// Numbered citation block shown after the answer
    pub fn format_sources(sources: &[Source]) -> String {
        if sources.is_empty() {
            return "No sources available.".to_string();
        }

        let mut lines = vec!["Sources:".to_string()];
        lines.extend(
            sources
                .iter()
                .enumerate()
                .map(|(i, s)| format!("{}. {}", i + 1, s.format_citation())),
        );
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChunkMetadata, ResultId, SectionType};

    fn result(metadata: ChunkMetadata, text: &str) -> RetrievalResult {
        RetrievalResult {
            id: ResultId::Ordinal(0),
            text: text.to_string(),
            metadata,
            distance: 0.0,
        }
    }

    #[test]
    fn test_context_blocks() {
        let full = ChunkMetadata {
            document_name: "VAT Act".to_string(),
            section_type: SectionType::Section,
            section_number: "12".to_string(),
            section_title: "Rate".to_string(),
            page_start: 4,
            page_end: 5,
            ..Default::default()
        };

        let context = PromptBuilder::build_context(&[
            result(full, "VAT is 7.5%."),
            result(ChunkMetadata::default(), "Orphan text."),
        ]);

        assert_eq!(
            context,
            "\n\n[Source 1] VAT Act - Section 12 - (Rate) - Page 4\nVAT is 7.5%.\
             \n\n---\n\n[Source 2] Unknown source\nOrphan text."
        );
    }

    #[test]
    fn test_empty_context_is_prefix_only() {
        assert_eq!(PromptBuilder::build_context(&[]), "\n\n");
    }

    #[test]
    fn test_format_sources() {
        assert_eq!(PromptBuilder::format_sources(&[]), "No sources available.");

        let source = Source {
            document: "VAT Act".to_string(),
            section: "12".to_string(),
            title: "Rate".to_string(),
            pages: "4-5".to_string(),
            section_type: "section".to_string(),
        };
        assert_eq!(
            PromptBuilder::format_sources(&[source]),
            "Sources:\n1. VAT Act Section 12 - Rate (Pages 4-5)"
        );
    }

    #[test]
    fn test_user_prompt_embeds_context_verbatim() {
        let prompt = PromptBuilder::user_prompt("What is VAT?", "\n\n[Source 1] X\nbody");
        assert!(prompt.starts_with("Question: What is VAT?"));
        assert!(prompt.contains("2025-2026:\n\n\n[Source 1] X\nbody"));
    }
}
