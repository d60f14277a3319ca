use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use filingrag_core::error::Error;
use filingrag_core::traits::VectorIndex;
use filingrag_core::types::{cosine_similarity, Chunk, ChunkFilter, Neighbor};

/// Brute-force cosine search over chunks held in insertion order.
pub struct MemoryIndex {
	dim: usize,
	chunks: RwLock<Vec<Chunk>>,
}

impl MemoryIndex {
	pub fn new(dim: usize) -> Self {
		Self { dim, chunks: RwLock::new(Vec::new()) }
	}

	pub async fn len(&self) -> usize {
		self.chunks.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.chunks.read().await.is_empty()
	}
}

#[async_trait]
impl VectorIndex for MemoryIndex {
	async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
		if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != self.dim) {
			return Err(Error::DimensionMismatch { index: self.dim, embedder: bad.embedding.len() }.into());
		}
		let mut stored = self.chunks.write().await;
		let mut inserted = 0;
		for chunk in chunks {
			if stored.iter().any(|c| c.chunk_id == chunk.chunk_id) { continue; }
			stored.push(chunk.clone());
			inserted += 1;
		}
		Ok(inserted)
	}

	async fn query_similar(&self, vector: &[f32], filter: &ChunkFilter, k: usize) -> Result<Vec<Neighbor>> {
		let stored = self.chunks.read().await;
		let mut hits: Vec<Neighbor> = stored
			.iter()
			.filter(|c| filter.matches(c))
			.map(|c| Neighbor { similarity: cosine_similarity(vector, &c.embedding), chunk: c.clone() })
			.collect();
		// stable: equal similarities stay in insertion order
		hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
		hits.truncate(k);
		Ok(hits)
	}

	async fn exists(&self, chunk_id: &str) -> Result<bool> {
		Ok(self.chunks.read().await.iter().any(|c| c.chunk_id == chunk_id))
	}

	async fn count(&self, filter: &ChunkFilter) -> Result<usize> {
		Ok(self.chunks.read().await.iter().filter(|c| filter.matches(c)).count())
	}

	async fn delete_by_source(&self, source_id: &str) -> Result<usize> {
		let mut stored = self.chunks.write().await;
		let before = stored.len();
		stored.retain(|c| c.source_id != source_id);
		Ok(before - stored.len())
	}

	async fn stored_dim(&self) -> Result<Option<usize>> {
		Ok(Some(self.dim))
	}
}
