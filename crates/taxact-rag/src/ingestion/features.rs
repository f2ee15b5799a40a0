//! Content feature flags and uncertainty annotations for chunks

use once_cell::sync::Lazy;
use regex::Regex;

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static DEFINITION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)["“'‘][^"“”'‘’\n]{1,100}["”'’]\s*,?\s*(?:means|refers\s+to|includes)\b"#)
        .expect("Invalid regex")
});

static RATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\d+(?:\.\d+)?\s*%|\d+(?:\.\d+)?\s*per\s*cent").expect("Invalid regex")
});

static PERCENT_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*%").expect("Invalid regex"));

static DATES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\b\d{1,2}[-/]\d{1,2}[-/]\d{2,4}\b".to_string(),
        r"\b\d{4}[-/]\d{1,2}[-/]\d{1,2}\b".to_string(),
        format!(r"(?i)\b(?:{})\s+\d{{1,2}},?\s+\d{{4}}\b", MONTHS),
        format!(r"(?i)\b\d{{1,2}}(?:st|nd|rd|th)?\s+(?:{})\s+\d{{4}}\b", MONTHS),
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:[₦$£€]\s*|\b(?:NGN|USD|GBP|EUR|Naira)\s*)\d[\d,]*(?:\.\d+)?")
        .expect("Invalid regex")
});

static CONDITIONAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:may|might|could|should|would|uncertain|unclear|subject\s+to)\b")
        .expect("Invalid regex")
});

static AMENDMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:amend|repeal|replac|substitut|modif|chang)\w*").expect("Invalid regex")
});

static EXCEPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:except\w*|unless|provided\s+that|save\s+(?:as|where|that|for)|notwithstanding)\b",
    )
    .expect("Invalid regex")
});

/// Feature flags and notes computed from one chunk's text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFeatures {
    pub contains_definition: bool,
    pub contains_rate: bool,
    pub contains_date: bool,
    pub contains_amount: bool,
    pub uncertainty_notes: Vec<String>,
}

impl ChunkFeatures {
    /// Run every detector over `text`
    pub fn detect(text: &str) -> Self {
        Self {
            contains_definition: DEFINITION.is_match(text),
            contains_rate: RATE.is_match(text),
            contains_date: DATES.iter().any(|re| re.is_match(text)),
            contains_amount: AMOUNT.is_match(text),
            uncertainty_notes: uncertainty_notes(text),
        }
    }
}

/// Free-text notes for conditional, conflicting, amending, or excepting language
pub fn uncertainty_notes(text: &str) -> Vec<String> {
    let mut notes = Vec::new();

    if CONDITIONAL.is_match(text) {
        notes.push("Contains conditional or uncertain language".to_string());
    }

    let rates = distinct_percentages(text);
    if rates.len() > 2 {
        notes.push(format!("Multiple rates mentioned: {}", rates.join(", ")));
    }

    if AMENDMENT.is_match(text) {
        notes.push("Contains amendments or changes to existing law".to_string());
    }

    if EXCEPTION.is_match(text) {
        notes.push("Contains exceptions or special conditions".to_string());
    }

    notes
}

/// Percentage values in order of first appearance, without repeats
fn distinct_percentages(text: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for cap in PERCENT_VALUE.captures_iter(text) {
        let value = format!("{}%", &cap[1]);
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}
