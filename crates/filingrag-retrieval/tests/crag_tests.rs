use filingrag_core::config::RetrievalConfig;
use filingrag_core::types::{Band, Candidate, Chunk};
use filingrag_retrieval::RelevanceFilter;

const QUERY: &str = "China tariffs";

/// 2-D unit vector whose cosine with `[1, 0]` is `cos`.
fn at_cos(cos: f32) -> Vec<f32> {
    vec![cos, (1.0 - cos * cos).sqrt()]
}

fn candidate(id: &str, text: &str, cos: f32) -> Candidate {
    Candidate::new(
        Chunk {
            chunk_id: id.to_string(),
            text: text.to_string(),
            embedding: at_cos(cos),
            source_id: "0000320193".to_string(),
            filing_type: "10-K".to_string(),
            period: "2024".to_string(),
            section: "risk_factors".to_string(),
            parent_text: text.to_string(),
            trimmed: false,
        },
        cos,
    )
}

fn query_vec() -> Vec<f32> {
    vec![1.0, 0.0]
}

fn ids(c: &[Candidate]) -> Vec<&str> {
    c.iter().map(|c| c.id()).collect()
}

fn five_candidates() -> Vec<Candidate> {
    vec![
        candidate("strong", "Tariffs on goods from China raised our costs.", 0.9),
        candidate("partial", "We opened new retail stores. New tariffs increased component prices.", 0.1),
        candidate("weak-1", "Dividends were paid quarterly.", 0.1),
        candidate("weak-2", "The board met four times.", 0.1),
        candidate("weak-3", "Headcount grew modestly.", 0.1),
    ]
}

#[test]
fn unrelated_chunk_is_discarded() {
    let filter = RelevanceFilter::default();
    let input = vec![
        candidate("a", "Tariffs on goods from China raised costs.", 0.9),
        candidate("b", "China tariffs remain a risk.", 0.8),
        candidate("off-topic", "Our headquarters is in Cupertino.", 0.1),
    ];
    let out = filter.filter(QUERY, &query_vec(), &input);
    assert_eq!(ids(&out), vec!["a", "b"]);
    assert!(out.iter().all(|c| c.band == Some(Band::Correct) && !c.chunk.trimmed));
}

#[test]
fn off_topic_score_falls_below_low() {
    let filter = RelevanceFilter::default();
    let keywords = filingrag_text::extract_keywords(QUERY);
    let c = candidate("off-topic", "Our headquarters is in Cupertino.", 0.1);
    let score = filter.score(&keywords, &query_vec(), &c.chunk);
    assert!(score < 0.3, "score={score}");
}

#[test]
fn one_relaxation_admits_trimmed_second_candidate() {
    let filter = RelevanceFilter::default();
    let out = filter.filter(QUERY, &query_vec(), &five_candidates());
    assert_eq!(ids(&out), vec!["strong", "partial"]);
    assert_eq!(out[0].band, Some(Band::Correct));
    assert!(!out[0].chunk.trimmed);
    assert_eq!(out[1].band, Some(Band::Ambiguous));
    assert!(out[1].chunk.trimmed);
    assert_eq!(out[1].chunk.text, "New tariffs increased component prices.");
    assert_eq!(out[1].chunk.parent_text, five_candidates()[1].chunk.text);
}

#[test]
fn ambiguous_without_keyword_sentence_keeps_full_text() {
    // overlap 0, similarity 0.6 -> 0.36: ambiguous, nothing to trim to
    let filter = RelevanceFilter::default();
    let input = vec![
        candidate("a", "Tariffs on goods from China raised costs.", 0.9),
        candidate("b", "Import duties weighed on margins.", 0.6),
    ];
    let out = filter.filter(QUERY, &query_vec(), &input);
    assert_eq!(out[1].band, Some(Band::Ambiguous));
    assert!(!out[1].chunk.trimmed);
    assert_eq!(out[1].chunk.text, "Import duties weighed on margins.");
}

#[test]
fn exhausted_relaxation_returns_best_by_score_in_input_order() {
    let filter = RelevanceFilter::new(&RetrievalConfig { min_results: 3, max_relaxations: 1, ..RetrievalConfig::default() });
    let input = vec![
        candidate("low", "Nothing here.", 0.05),
        candidate("mid", "Still nothing.", 0.12),
        candidate("best", "Unrelated text.", 0.15),
        candidate("zero", "Nope.", 0.0),
    ];
    let out = filter.filter(QUERY, &query_vec(), &input);
    assert_eq!(ids(&out), vec!["low", "mid", "best"]);
    assert!(out.iter().all(|c| !c.chunk.trimmed));
    assert!(out.iter().all(|c| c.band != Some(Band::Incorrect)), "{:?}", out.iter().map(|c| c.band).collect::<Vec<_>>());
}

#[test]
fn full_relaxation_admits_zero_score() {
    // no keyword, orthogonal embedding: score is exactly 0
    let filter = RelevanceFilter::new(&RetrievalConfig { min_results: 1, ..RetrievalConfig::default() });
    let input = vec![candidate("zero", "Headcount grew modestly.", 0.0)];
    let out = filter.filter(QUERY, &query_vec(), &input);
    assert_eq!(ids(&out), vec!["zero"]);
    assert_eq!(out[0].band, Some(Band::Ambiguous));
    assert!(!out[0].chunk.trimmed);
}

#[test]
fn never_yields_fewer_than_min_results() {
    let filter = RelevanceFilter::default();
    for n in 2..=5 {
        let input: Vec<Candidate> = five_candidates().into_iter().skip(5 - n).collect();
        let out = filter.filter(QUERY, &query_vec(), &input);
        assert!(out.len() >= 2, "n={n} got {}", out.len());
    }
    let single = vec![candidate("only", "Nothing.", 0.0)];
    assert_eq!(filter.filter(QUERY, &query_vec(), &single).len(), 1);
    assert!(filter.filter(QUERY, &query_vec(), &[]).is_empty());
}

#[test]
fn filtering_is_deterministic() {
    let filter = RelevanceFilter::default();
    let input = five_candidates();
    let first = filter.filter(QUERY, &query_vec(), &input);
    for _ in 0..5 {
        assert_eq!(filter.filter(QUERY, &query_vec(), &input), first);
    }
}

#[test]
fn keyword_free_query_uses_neutral_overlap() {
    let filter = RelevanceFilter::default();
    let c = candidate("x", "Anything at all.", 1.0);
    // 0.4 * 0.5 + 0.6 * 1.0
    let score = filter.score(&[], &query_vec(), &c.chunk);
    assert!((score - 0.8).abs() < 1e-5);
}

#[test]
fn negative_similarity_is_clamped() {
    let filter = RelevanceFilter::default();
    let mut c = candidate("x", "Nothing.", 0.0);
    c.chunk.embedding = vec![-1.0, 0.0];
    let keywords = filingrag_text::extract_keywords(QUERY);
    assert_eq!(filter.score(&keywords, &query_vec(), &c.chunk), 0.0);
}
