use std::sync::Arc;
use tracing::{debug, warn};

use filingrag_core::traits::Scorer;
use filingrag_core::types::Candidate;

/// Output of [`Reranker::rerank`]. `degraded` is set when no cross-encoder
/// score was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Reranked {
    pub candidates: Vec<Candidate>,
    pub degraded: bool,
}

#[derive(Clone, Default)]
pub struct Reranker {
    scorer: Option<Arc<dyn Scorer>>,
}

impl Reranker {
    pub fn new(scorer: Option<Arc<dyn Scorer>>) -> Self {
        Self { scorer }
    }

    pub fn is_available(&self) -> bool {
        self.scorer.is_some()
    }

    /// Top `final_k` by cross-encoder score, descending; equal scores keep
    /// their input order. Without a working scorer the first `final_k`
    /// candidates come back as given.
    pub fn rerank(&self, query: &str, candidates: Vec<Candidate>, final_k: usize) -> Reranked {
        let Some(scorer) = &self.scorer else { return degraded(candidates, final_k) };
        if candidates.is_empty() { return Reranked { candidates, degraded: false }; }

        let texts: Vec<String> = candidates.iter().map(|c| c.chunk.text.clone()).collect();
        let scores = match scorer.score_batch(query, &texts) {
            Ok(s) if s.len() == candidates.len() => s,
            Ok(s) => {
                warn!(expected = candidates.len(), got = s.len(), "scorer returned wrong number of scores; skipping rerank");
                return degraded(candidates, final_k);
            }
            Err(e) => {
                warn!(error = %e, "scorer failed; skipping rerank");
                return degraded(candidates, final_k);
            }
        };

        let mut scored: Vec<Candidate> = candidates.into_iter().zip(scores).map(|(c, score)| Candidate { score, ..c }).collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(final_k);
        debug!(kept = scored.len(), final_k, "reranked");
        Reranked { candidates: scored, degraded: false }
    }
}

fn degraded(mut candidates: Vec<Candidate>, final_k: usize) -> Reranked {
    candidates.truncate(final_k);
    Reranked { candidates, degraded: true }
}
