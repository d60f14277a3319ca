//! Domain types shared by the index, the models and the retrieval stages.

use serde::{Deserialize, Serialize};

pub type ChunkId = String;

/// A chunk of a filing section that is independently indexed.
///
/// - `chunk_id`: content-derived identifier; equal ids imply equal payloads
/// - `source_id`: issuer identity (e.g. a zero-padded CIK)
/// - `filing_type`/`period`: which filing and reporting year the text came from
/// - `section`: category label such as `risk_factors`
/// - `parent_text`: the full enclosing section, for parent document retrieval
/// - `trimmed`: set only on per-query copies whose text was cut down to the
///   sentences relevant to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: ChunkId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    pub source_id: String,
    pub filing_type: String,
    pub period: String,
    pub section: String,
    pub parent_text: String,
    #[serde(default)]
    pub trimmed: bool,
}

/// Equality restrictions applied by the vector index before ranking.
///
/// A `None` field does not restrict. Results for a non-empty filter never
/// contain a chunk that fails any of the set fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkFilter {
    pub source_id: Option<String>,
    pub period: Option<String>,
    pub filing_type: Option<String>,
}

impl ChunkFilter {
    pub fn source(source_id: impl Into<String>) -> Self {
        Self { source_id: Some(source_id.into()), ..Self::default() }
    }

    pub fn with_period(mut self, period: impl Into<String>) -> Self {
        self.period = Some(period.into());
        self
    }

    pub fn with_filing_type(mut self, filing_type: impl Into<String>) -> Self {
        self.filing_type = Some(filing_type.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.source_id.is_none() && self.period.is_none() && self.filing_type.is_none()
    }

    pub fn matches(&self, chunk: &Chunk) -> bool {
        fn eq(want: &Option<String>, got: &str) -> bool {
            want.as_deref().map_or(true, |w| w == got)
        }
        eq(&self.source_id, &chunk.source_id)
            && eq(&self.period, &chunk.period)
            && eq(&self.filing_type, &chunk.filing_type)
    }
}

/// One nearest-neighbour hit: a stored chunk and its cosine similarity to the probe.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub chunk: Chunk,
    pub similarity: f32,
}

/// Relevance band assigned by the corrective filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Band {
    /// Kept with its full text.
    Correct,
    /// Kept, text reduced to the sentences mentioning a query keyword.
    Ambiguous,
    /// Discarded.
    Incorrect,
}

/// A chunk travelling through one pipeline invocation, never persisted.
///
/// `score` is whatever the most recent stage assigned: similarity after
/// retrieval, the blended relevance score after filtering, the cross-encoder
/// score after reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub chunk: Chunk,
    pub score: f32,
    pub band: Option<Band>,
}

impl Candidate {
    pub fn new(chunk: Chunk, score: f32) -> Self {
        Self { chunk, score, band: None }
    }

    pub fn id(&self) -> &str {
        &self.chunk.chunk_id
    }
}

impl From<Neighbor> for Candidate {
    fn from(n: Neighbor) -> Self {
        Candidate::new(n.chunk, n.similarity)
    }
}

/// One passage handed back to the caller, with citation metadata and no
/// raw embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalEntry {
    pub chunk_id: ChunkId,
    pub text: String,
    pub score: f32,
    pub source_id: String,
    pub filing_type: String,
    pub period: String,
    pub section: String,
    pub parent_text: String,
    pub trimmed: bool,
    /// Produced without cross-encoder reranking.
    pub degraded: bool,
}

impl RetrievalEntry {
    pub fn from_candidate(candidate: Candidate, degraded: bool) -> Self {
        let Candidate { chunk, score, .. } = candidate;
        Self {
            chunk_id: chunk.chunk_id,
            text: chunk.text,
            score,
            source_id: chunk.source_id,
            filing_type: chunk.filing_type,
            period: chunk.period,
            section: chunk.section,
            parent_text: chunk.parent_text,
            trimmed: chunk.trimmed,
            degraded,
        }
    }
}

/// Ordered answer set of one query; entries are unique by `chunk_id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalResult {
    entries: Vec<RetrievalEntry>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from ranked entries, dropping any repeated `chunk_id` after its
    /// first occurrence.
    pub fn from_entries(entries: impl IntoIterator<Item = RetrievalEntry>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let entries = entries.into_iter().filter(|e| seen.insert(e.chunk_id.clone())).collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[RetrievalEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievalEntry> {
        self.entries.iter()
    }
}

impl IntoIterator for RetrievalResult {
    type Item = RetrievalEntry;
    type IntoIter = std::vec::IntoIter<RetrievalEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Cosine similarity of two vectors; 0.0 when either is empty, zero or the
/// lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom <= f32::EPSILON { 0.0 } else { dot / denom }
}
