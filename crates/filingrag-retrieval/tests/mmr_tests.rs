use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use filingrag_core::config::RetrievalConfig;
use filingrag_core::error::Error;
use filingrag_core::traits::VectorIndex;
use filingrag_core::types::{cosine_similarity, Chunk, ChunkFilter, Neighbor};
use filingrag_retrieval::{mmr_select, DiversityRetriever};
use filingrag_vector::MemoryIndex;

fn chunk(id: &str, source: &str, period: &str, embedding: Vec<f32>) -> Chunk {
    Chunk {
        chunk_id: id.to_string(),
        text: format!("passage {id}"),
        embedding,
        source_id: source.to_string(),
        filing_type: "10-K".to_string(),
        period: period.to_string(),
        section: "risk_factors".to_string(),
        parent_text: String::new(),
        trimmed: false,
    }
}

fn pool(query: &[f32], items: &[(&str, Vec<f32>)]) -> Vec<Neighbor> {
    items
        .iter()
        .map(|(id, e)| Neighbor { similarity: cosine_similarity(query, e), chunk: chunk(id, "s", "2024", e.clone()) })
        .collect()
}

fn ids(c: &[filingrag_core::types::Candidate]) -> Vec<&str> {
    c.iter().map(|c| c.id()).collect()
}

fn toy() -> (Vec<f32>, Vec<(&'static str, Vec<f32>)>) {
    (vec![1.0, 0.0], vec![("c1", vec![0.9, 0.1]), ("c2", vec![0.88, 0.12]), ("c3", vec![0.0, 1.0])])
}

#[test]
fn diversity_weighted_lambda_skips_near_duplicate() {
    let (q, items) = toy();
    let out = mmr_select(pool(&q, &items), 3, 0.3);
    assert_eq!(ids(&out), vec!["c1", "c3", "c2"]);
}

#[test]
fn default_lambda_follows_formula() {
    // At 0.7 the relevance term of c2 outweighs its redundancy with c1.
    let (q, items) = toy();
    let out = mmr_select(pool(&q, &items), 3, 0.7);
    assert_eq!(ids(&out), vec!["c1", "c2", "c3"]);
}

#[test]
fn lambda_one_is_plain_top_k() {
    let q = vec![1.0, 0.0, 0.0];
    let items = vec![
        ("a", vec![0.2, 1.0, 0.0]),
        ("b", vec![1.0, 0.1, 0.0]),
        ("c", vec![1.0, 0.0, 0.1]),
        ("d", vec![0.5, 0.5, 0.5]),
    ];
    let p = pool(&q, &items);
    let mut expected: Vec<&Neighbor> = p.iter().collect();
    expected.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    let expected: Vec<&str> = expected.iter().take(3).map(|n| n.chunk.chunk_id.as_str()).collect();
    let out = mmr_select(p.clone(), 3, 1.0);
    assert_eq!(ids(&out), expected);
}

#[test]
fn lambda_zero_maximises_dissimilarity() {
    let q = vec![1.0, 0.0];
    let items = vec![("near", vec![1.0, 0.0]), ("close", vec![0.95, 0.05]), ("far", vec![-1.0, 0.2]), ("side", vec![0.0, 1.0])];
    let out = mmr_select(pool(&q, &items), 2, 0.0);
    // first pick by query similarity, second is the least similar to it
    assert_eq!(ids(&out), vec!["near", "far"]);
}

#[test]
fn fewer_candidates_than_requested() {
    let (q, items) = toy();
    let out = mmr_select(pool(&q, &items), 10, 0.7);
    assert_eq!(out.len(), 3);
    assert!(mmr_select(Vec::new(), 5, 0.7).is_empty());
}

#[test]
fn selected_scores_are_query_similarity() {
    let (q, items) = toy();
    let out = mmr_select(pool(&q, &items), 1, 0.5);
    assert!((out[0].score - cosine_similarity(&q, &items[0].1)).abs() < 1e-6);
    assert!(out[0].band.is_none());
}

async fn seeded_index() -> Arc<MemoryIndex> {
    let index = Arc::new(MemoryIndex::new(2));
    index
        .add(&[
            chunk("apple-2022", "AAPL", "2022", vec![1.0, 0.0]),
            chunk("apple-2023", "AAPL", "2023", vec![0.8, 0.2]),
            chunk("apple-2024", "AAPL", "2024", vec![0.7, 0.3]),
            chunk("msft-2023", "MSFT", "2023", vec![1.0, 0.0]),
        ])
        .await
        .unwrap();
    index
}

#[tokio::test]
async fn retrieve_respects_source_and_period_filters() {
    let index = seeded_index().await;
    let retriever = DiversityRetriever::new(index, &RetrievalConfig::default());
    let periods = vec!["2022".to_string(), "2023".to_string()];
    let out = retriever.retrieve(&[1.0, 0.0], "AAPL", Some("10-K"), &periods).await.unwrap();
    assert_eq!(out.len(), 2);
    for c in &out {
        assert_eq!(c.chunk.source_id, "AAPL");
        assert!(periods.contains(&c.chunk.period));
    }
}

#[tokio::test]
async fn retrieve_without_periods_stays_within_source() {
    let index = seeded_index().await;
    let retriever = DiversityRetriever::new(index, &RetrievalConfig::default());
    let out = retriever.retrieve(&[1.0, 0.0], "AAPL", None, &[]).await.unwrap();
    assert_eq!(out.len(), 3);
    assert!(out.iter().all(|c| c.chunk.source_id == "AAPL"));
}

#[tokio::test]
async fn retrieve_unknown_source_is_empty() {
    let index = seeded_index().await;
    let retriever = DiversityRetriever::new(index, &RetrievalConfig::default());
    let out = retriever.retrieve(&[1.0, 0.0], "NOPE", None, &["2023".to_string()]).await.unwrap();
    assert!(out.is_empty());
}

struct BrokenIndex;

#[async_trait]
impl VectorIndex for BrokenIndex {
    async fn add(&self, _: &[Chunk]) -> anyhow::Result<usize> { Err(anyhow!("offline")) }
    async fn query_similar(&self, _: &[f32], _: &ChunkFilter, _: usize) -> anyhow::Result<Vec<Neighbor>> { Err(anyhow!("offline")) }
    async fn exists(&self, _: &str) -> anyhow::Result<bool> { Err(anyhow!("offline")) }
    async fn count(&self, _: &ChunkFilter) -> anyhow::Result<usize> { Err(anyhow!("offline")) }
    async fn delete_by_source(&self, _: &str) -> anyhow::Result<usize> { Err(anyhow!("offline")) }
    async fn stored_dim(&self) -> anyhow::Result<Option<usize>> { Err(anyhow!("offline")) }
}

#[tokio::test]
async fn index_failure_is_index_unavailable() {
    let retriever = DiversityRetriever::new(Arc::new(BrokenIndex), &RetrievalConfig::default());
    let err = retriever.retrieve(&[1.0, 0.0], "AAPL", None, &["2023".to_string()]).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)));
    assert!(!err.is_fatal());
}

/// Serves every period except one from a seeded index.
struct FlakyPeriodIndex {
    inner: Arc<MemoryIndex>,
    failing: &'static str,
}

#[async_trait]
impl VectorIndex for FlakyPeriodIndex {
    async fn add(&self, chunks: &[Chunk]) -> anyhow::Result<usize> { self.inner.add(chunks).await }
    async fn query_similar(&self, vector: &[f32], filter: &ChunkFilter, k: usize) -> anyhow::Result<Vec<Neighbor>> {
        if filter.period.as_deref() == Some(self.failing) {
            return Err(anyhow!("shard for {} offline", self.failing));
        }
        self.inner.query_similar(vector, filter, k).await
    }
    async fn exists(&self, chunk_id: &str) -> anyhow::Result<bool> { self.inner.exists(chunk_id).await }
    async fn count(&self, filter: &ChunkFilter) -> anyhow::Result<usize> { self.inner.count(filter).await }
    async fn delete_by_source(&self, source_id: &str) -> anyhow::Result<usize> { self.inner.delete_by_source(source_id).await }
    async fn stored_dim(&self) -> anyhow::Result<Option<usize>> { self.inner.stored_dim().await }
}

#[tokio::test]
async fn one_failing_period_fails_the_whole_retrieval() {
    let index = FlakyPeriodIndex { inner: seeded_index().await, failing: "2023" };
    let retriever = DiversityRetriever::new(Arc::new(index), &RetrievalConfig::default());
    let periods = vec!["2022".to_string(), "2023".to_string()];
    let err = retriever.retrieve(&[1.0, 0.0], "AAPL", None, &periods).await.unwrap_err();
    assert!(matches!(err, Error::IndexUnavailable(_)), "{err}");

    // the healthy period alone still answers
    let out = retriever.retrieve(&[1.0, 0.0], "AAPL", None, &periods[..1]).await.unwrap();
    assert_eq!(ids(&out), vec!["apple-2022"]);
}
