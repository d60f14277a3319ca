//! Per-period nearest-neighbour fan-out followed by Maximal Marginal
//! Relevance selection over the union.

use futures::future::try_join_all;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use filingrag_core::config::RetrievalConfig;
use filingrag_core::error::{Error, Result};
use filingrag_core::traits::VectorIndex;
use filingrag_core::types::{cosine_similarity, Candidate, ChunkFilter, Neighbor};

#[derive(Clone)]
pub struct DiversityRetriever {
    index: Arc<dyn VectorIndex>,
    per_partition_k: usize,
    n_results: usize,
    lambda: f32,
}

impl DiversityRetriever {
    pub fn new(index: Arc<dyn VectorIndex>, cfg: &RetrievalConfig) -> Self {
        Self { index, per_partition_k: cfg.per_partition_k, n_results: cfg.n_results, lambda: cfg.lambda }
    }

    /// Candidates for `source_id` across `periods`, in MMR selection order.
    ///
    /// Each period is queried concurrently and all queries must finish before
    /// selection starts. With no periods the source is searched as a whole.
    /// Any index failure fails the call.
    pub async fn retrieve(&self, query_vector: &[f32], source_id: &str, filing_type: Option<&str>, periods: &[String]) -> Result<Vec<Candidate>> {
        let mut base = ChunkFilter::source(source_id);
        if let Some(ft) = filing_type { base = base.with_filing_type(ft); }
        let filters: Vec<ChunkFilter> =
            if periods.is_empty() { vec![base] } else { periods.iter().map(|p| base.clone().with_period(p.as_str())).collect() };

        let per_partition = try_join_all(filters.iter().map(|f| self.index.query_similar(query_vector, f, self.per_partition_k)))
            .await
            .map_err(|e| Error::IndexUnavailable(format!("{e:#}")))?;
        for (f, hits) in filters.iter().zip(&per_partition) {
            debug!(period = f.period.as_deref().unwrap_or("*"), hits = hits.len(), "partition searched");
        }

        let pool = union_by_id(per_partition);
        let selected = mmr_select(pool, self.n_results, self.lambda);
        debug!(selected = selected.len(), lambda = self.lambda, "mmr selection done");
        Ok(selected)
    }
}

/// Concatenate partition results, keeping the first occurrence of each chunk id.
pub fn union_by_id(lists: Vec<Vec<Neighbor>>) -> Vec<Neighbor> {
    let mut seen = HashSet::new();
    lists.into_iter().flatten().filter(|n| seen.insert(n.chunk.chunk_id.clone())).collect()
}

/// Greedy MMR over `pool`, which must already be in first-seen order.
///
/// `score(c) = λ·sim(c, q) − (1−λ)·max_s sim(c, s)`, or `sim(c, q)` while
/// nothing is selected. `sim(c, q)` is the neighbour's similarity as reported
/// by the index; `sim(c, s)` is the cosine of the stored embeddings. Ties go
/// to the higher query similarity, then to the earlier candidate. Each
/// returned candidate's score is its query similarity.
pub fn mmr_select(pool: Vec<Neighbor>, n_results: usize, lambda: f32) -> Vec<Candidate> {
    let mut remaining = pool;
    let mut selected: Vec<Neighbor> = Vec::with_capacity(n_results.min(remaining.len()));
    while selected.len() < n_results && !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (i, c) in remaining.iter().enumerate() {
            let score = if selected.is_empty() {
                c.similarity
            } else {
                let redundancy = selected.iter().map(|s| cosine_similarity(&c.chunk.embedding, &s.chunk.embedding)).fold(f32::NEG_INFINITY, f32::max);
                lambda * c.similarity - (1.0 - lambda) * redundancy
            };
            let wins = match best {
                None => true,
                Some((j, best_score)) => score > best_score || (score == best_score && c.similarity > remaining[j].similarity),
            };
            if wins { best = Some((i, score)); }
        }
        let Some((i, _)) = best else { break };
        selected.push(remaining.remove(i));
    }
    selected.into_iter().map(Candidate::from).collect()
}
