//! Collaborator contracts consumed by the retrieval pipeline.
//!
//! Model-backed collaborators (`Embedder`, `Scorer`) are synchronous and
//! CPU/GPU bound; callers move them onto a blocking thread. Collaborators that
//! talk to storage or the network (`VectorIndex`, `Generator`, `Ingestor`)
//! are async.

use async_trait::async_trait;

use crate::types::{Chunk, ChunkFilter, Neighbor};

pub trait Embedder: Send + Sync {
    /// Embedding dimensionality (D), fixed for the lifetime of the model.
    fn dim(&self) -> usize;
    /// Maximum token length for this model.
    fn max_len(&self) -> usize;
    /// Compute L2-normalized embeddings for a batch of input texts.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Prompt for a text generator: a fixed instruction plus the user question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub instruction: String,
    pub question: String,
}

impl GenerationRequest {
    /// Single-string rendering for generators without a system/user split.
    pub fn render(&self) -> String {
        format!("{}\n\nQuestion: {}", self.instruction, self.question)
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;
}

/// Joint (query, passage) relevance model.
pub trait Scorer: Send + Sync {
    /// One score per text, in input order. Higher is more relevant.
    fn score_batch(&self, query: &str, texts: &[String]) -> anyhow::Result<Vec<f32>>;

    fn score(&self, query: &str, text: &str) -> anyhow::Result<f32> {
        self.score_batch(query, &[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("scorer returned no score"))
    }
}

/// Persisted chunk store with filtered cosine nearest-neighbour search.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert chunks whose `chunk_id` is not stored yet; returns how many were new.
    async fn add(&self, chunks: &[Chunk]) -> anyhow::Result<usize>;
    /// Up to `k` chunks matching `filter`, most similar first.
    async fn query_similar(&self, vector: &[f32], filter: &ChunkFilter, k: usize) -> anyhow::Result<Vec<Neighbor>>;
    async fn exists(&self, chunk_id: &str) -> anyhow::Result<bool>;
    async fn count(&self, filter: &ChunkFilter) -> anyhow::Result<usize>;
    /// Remove every chunk of a source; returns how many were removed.
    async fn delete_by_source(&self, source_id: &str) -> anyhow::Result<usize>;
    /// Vector dimension the index was created with, `None` while it holds no schema yet.
    async fn stored_dim(&self) -> anyhow::Result<Option<usize>>;
}

/// Acquires, splits and returns the chunks of one partition. Embedding and
/// storing them is left to the caller.
#[async_trait]
pub trait Ingestor: Send + Sync {
    async fn is_indexed(&self, source_id: &str, filing_type: &str, period: &str) -> anyhow::Result<bool>;
    async fn ingest(&self, source_id: &str, filing_type: &str, period: &str) -> anyhow::Result<Vec<Chunk>>;
}
