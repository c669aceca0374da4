//! Domain types shared by providers, stores, and pipelines.

use serde::{Deserialize, Serialize};

pub type DocumentId = String;

/// Characters of text kept in a result preview.
pub const PREVIEW_CHARS: usize = 200;

/// One entry handed to ingestion by whoever owns the raw corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub id: DocumentId,
    pub source: String,
    pub text: String,
    pub language: String,
}

/// A persisted document together with its embedding.
///
/// Field names on disk follow the existing `{id, filename, content,
/// embedding, language}` JSON layout, so previously generated record files
/// load unchanged. `provider` is empty for such legacy files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    #[serde(rename = "filename")]
    pub source: String,
    #[serde(rename = "content")]
    pub text: String,
    pub embedding: Vec<f32>,
    pub language: String,
    #[serde(default)]
    pub provider: String,
}

impl DocumentRecord {
    pub fn new(entry: CorpusEntry, embedding: Vec<f32>, provider: impl Into<String>) -> Self {
        Self {
            id: entry.id,
            source: entry.source,
            text: entry.text,
            embedding,
            language: entry.language,
            provider: provider.into(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.embedding.len()
    }
}

/// Which stage produced a score. The two scales are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
    /// Cosine similarity, roughly in `[-1, 1]`.
    Cosine,
    /// Reranker relevance; the range is provider-defined.
    Relevance,
}

/// A record paired with the score of the stage that ranked it.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f64,
}

/// What the query interface hands back to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: DocumentId,
    pub source: String,
    pub text: String,
    pub language: String,
    pub preview: String,
    pub score: f64,
    /// 1-based position in the final ranking.
    pub rank: usize,
    pub score_kind: ScoreKind,
}

impl SearchResult {
    pub fn from_record(record: DocumentRecord, score: f64, rank: usize, score_kind: ScoreKind) -> Self {
        Self {
            preview: preview(&record.text),
            id: record.id,
            source: record.source,
            text: record.text,
            language: record.language,
            score,
            rank,
            score_kind,
        }
    }
}

/// Read-only corpus/index size report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub document_count: usize,
    pub vector_count: usize,
    pub indexed: bool,
    pub dimension: Option<usize>,
}

/// First [`PREVIEW_CHARS`] characters of `text` followed by `...`.
pub fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_counts_characters_not_bytes() {
        let text = "é".repeat(250);
        let p = preview(&text);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_of_short_text_still_has_marker() {
        assert_eq!(preview("short"), "short...");
    }

    #[test]
    fn legacy_record_without_provider_parses() {
        let json = r#"{"id":"cv_en_1","filename":"cv_en_1.txt","content":"iOS dev","embedding":[0.5,-0.25],"language":"en"}"#;
        let rec: DocumentRecord = serde_json::from_str(json).unwrap();
        assert_eq!(rec.source, "cv_en_1.txt");
        assert_eq!(rec.text, "iOS dev");
        assert_eq!(rec.provider, "");
        assert_eq!(rec.dimension(), 2);
    }
}
