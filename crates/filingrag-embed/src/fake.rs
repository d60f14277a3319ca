//! Deterministic stand-ins for the neural models, used in tests and in
//! development without model weights.

use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use filingrag_core::traits::{Embedder, Scorer};

/// Dimension of [`FakeEmbedder`] when picked through the environment.
pub const FAKE_DIM: usize = 1024;

/// Bag-of-words hashing embedder: each normalized token bumps one bucket,
/// so texts sharing words have positive cosine similarity.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in normalized_tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            v[idx] += 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_one(t)).collect()) }
}

/// Scores a passage by the fraction of distinct query tokens it contains.
pub struct LexicalScorer;

impl Scorer for LexicalScorer {
    fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let mut terms: Vec<String> = normalized_tokens(query).collect();
        terms.sort(); terms.dedup();
        Ok(texts.iter().map(|t| {
            if terms.is_empty() { return 0.0; }
            let words: std::collections::HashSet<String> = normalized_tokens(t).collect();
            terms.iter().filter(|q| words.contains(*q)).count() as f32 / terms.len() as f32
        }).collect())
    }
}

fn normalized_tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}
