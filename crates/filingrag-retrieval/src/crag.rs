//! Corrective relevance filtering.
//!
//! Each candidate gets `w_k·keyword_overlap + w_e·clamp(cos, 0, 1)` against
//! the raw question and is banded:
//!
//! - `score > high`: CORRECT, kept whole
//! - `low <= score <= high`: AMBIGUOUS, cut down to its keyword sentences
//! - `score < low`: INCORRECT, dropped
//!
//! When fewer than `min_results` survive, both thresholds drop by
//! `relax_step` and the original candidates are banded again, at most
//! `max_relaxations` times. If that still falls short the best
//! `min_results` by score are returned with their full text, none of them
//! banded INCORRECT. Output always follows input order.

use tracing::{debug, info};

use filingrag_core::config::RetrievalConfig;
use filingrag_core::types::{cosine_similarity, Band, Candidate, Chunk};
use filingrag_text::{extract_keywords, keyword_overlap, relevant_sentences};

pub fn band_for(score: f32, high: f32, low: f32) -> Band {
    if score > high {
        Band::Correct
    } else if score >= low {
        Band::Ambiguous
    } else {
        Band::Incorrect
    }
}

/// Band of a best-effort entry: returned entries are never INCORRECT.
fn fallback_band(score: f32, high: f32, low: f32) -> Band {
    match band_for(score, high, low) {
        Band::Incorrect => Band::Ambiguous,
        band => band,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelevanceFilter {
    high: f32,
    low: f32,
    min_results: usize,
    max_relaxations: usize,
    relax_step: f32,
    w_k: f32,
    w_e: f32,
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(&RetrievalConfig::default())
    }
}

impl RelevanceFilter {
    pub fn new(cfg: &RetrievalConfig) -> Self {
        Self {
            high: cfg.high,
            low: cfg.low,
            min_results: cfg.min_results,
            max_relaxations: cfg.max_relaxations,
            relax_step: cfg.relax_step,
            w_k: cfg.w_k,
            w_e: cfg.w_e,
        }
    }

    pub fn score(&self, keywords: &[String], query_embedding: &[f32], chunk: &Chunk) -> f32 {
        let overlap = keyword_overlap(keywords, &chunk.text);
        let similarity = cosine_similarity(&chunk.embedding, query_embedding).clamp(0.0, 1.0);
        self.w_k * overlap + self.w_e * similarity
    }

    /// Band `candidates` for `raw_query`. Pure: the same inputs always give
    /// the same output.
    pub fn filter(&self, raw_query: &str, query_embedding: &[f32], candidates: &[Candidate]) -> Vec<Candidate> {
        if candidates.is_empty() { return Vec::new(); }
        let keywords = extract_keywords(raw_query);
        let scores: Vec<f32> = candidates.iter().map(|c| self.score(&keywords, query_embedding, &c.chunk)).collect();
        let target = self.min_results.min(candidates.len());

        let (mut high, mut low) = (self.high, self.low);
        for attempt in 0..=self.max_relaxations {
            if attempt > 0 {
                high = self.relax(high);
                low = self.relax(low);
                debug!(attempt, high, low, "relaxing relevance thresholds");
            }
            let kept = self.band_all(candidates, &scores, &keywords, high, low);
            if kept.len() >= target {
                debug!(kept = kept.len(), of = candidates.len(), relaxations = attempt, "relevance filter done");
                return kept;
            }
        }

        info!(min_results = target, "relaxation exhausted; returning best-effort candidates");
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
        order.truncate(target);
        order.sort_unstable();
        order
            .into_iter()
            .map(|i| Candidate { chunk: candidates[i].chunk.clone(), score: scores[i], band: Some(fallback_band(scores[i], high, low)) })
            .collect()
    }

    /// One relaxation step. Residue under half a step snaps to 0 so float
    /// drift cannot leave a threshold just above it.
    fn relax(&self, threshold: f32) -> f32 {
        let next = threshold - self.relax_step;
        if next < self.relax_step / 2.0 { 0.0 } else { next }
    }

    fn band_all(&self, candidates: &[Candidate], scores: &[f32], keywords: &[String], high: f32, low: f32) -> Vec<Candidate> {
        let mut counts = [0usize; 3];
        let mut kept = Vec::new();
        for (candidate, &score) in candidates.iter().zip(scores) {
            let band = band_for(score, high, low);
            if band == Band::Incorrect {
                counts[2] += 1;
                continue;
            }
            let mut chunk = candidate.chunk.clone();
            if band == Band::Ambiguous {
                counts[1] += 1;
                if let Some(text) = relevant_sentences(&chunk.text, keywords) {
                    chunk.text = text;
                    chunk.trimmed = true;
                }
            } else {
                counts[0] += 1;
            }
            kept.push(Candidate { chunk, score, band: Some(band) });
        }
        debug!(correct = counts[0], ambiguous = counts[1], incorrect = counts[2], high, low, "candidates banded");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_are_inclusive_for_ambiguous() {
        assert_eq!(band_for(0.71, 0.7, 0.3), Band::Correct);
        assert_eq!(band_for(0.7, 0.7, 0.3), Band::Ambiguous);
        assert_eq!(band_for(0.3, 0.7, 0.3), Band::Ambiguous);
        assert_eq!(band_for(0.29, 0.7, 0.3), Band::Incorrect);
    }

    #[test]
    fn relaxation_reaches_zero_exactly() {
        let filter = RelevanceFilter::default();
        let mut low = 0.3;
        for _ in 0..3 { low = filter.relax(low); }
        assert_eq!(low, 0.0);
        assert_eq!(filter.relax(0.0), 0.0);
    }

    #[test]
    fn fallback_never_reads_as_discarded() {
        assert_eq!(fallback_band(0.05, 0.6, 0.2), Band::Ambiguous);
        assert_eq!(fallback_band(0.65, 0.6, 0.2), Band::Correct);
    }
}
