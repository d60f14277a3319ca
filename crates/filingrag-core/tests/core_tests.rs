use std::fs;
use tempfile::TempDir;

use filingrag_core::config::{Config, RetrievalConfig};
use filingrag_core::data_processor::{chunk_stats, ChunkingConfig, DataProcessor, FilingSection};
use filingrag_core::error::Error;
use filingrag_core::types::{cosine_similarity, Chunk, ChunkFilter, RetrievalEntry, RetrievalResult};
use figment::providers::{Format, Toml};
use figment::Figment;

fn words(n: usize, prefix: &str) -> String {
    (0..n).map(|i| format!("{prefix}{i}")).collect::<Vec<_>>().join(" ")
}

fn section(text: String) -> FilingSection {
    FilingSection {
        source_id: "0000320193".into(),
        filing_type: "10-K".into(),
        period: "2024".into(),
        section: "risk_factors".into(),
        text,
    }
}

#[test]
fn process_partition_reads_section_files() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("0000320193").join("10-K").join("2024");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("risk_factors.txt"), words(120, "risk")).unwrap();
    fs::write(dir.join("mda.txt"), words(60, "mda")).unwrap();
    fs::write(dir.join("notes.md"), words(60, "ignored")).unwrap();

    let processor = DataProcessor::new();
    let chunks = processor.process_partition(tmp.path(), "0000320193", "10-K", "2024").expect("process");

    assert_eq!(chunks.len(), 2, "one chunk per short section, non-txt skipped");
    let sections: Vec<&str> = chunks.iter().map(|c| c.section.as_str()).collect();
    assert_eq!(sections, vec!["mda", "risk_factors"]);
    for c in &chunks {
        assert_eq!(c.source_id, "0000320193");
        assert_eq!(c.period, "2024");
        assert!(c.embedding.is_empty());
        assert!(!c.trimmed);
    }
}

#[test]
fn process_partition_missing_dir_is_empty() {
    let tmp = TempDir::new().unwrap();
    let chunks = DataProcessor::new().process_partition(tmp.path(), "x", "10-K", "2020").unwrap();
    assert!(chunks.is_empty());
}

#[test]
fn chunk_section_windows_overlap_and_keep_parent() {
    let processor = DataProcessor::with_config(ChunkingConfig { words_per_chunk: 10, overlap_words: 2, min_words: 3 });
    let s = section(words(25, "w"));
    let chunks = processor.chunk_section(&s);

    // windows start at 0, 8, 16, 24; the last holds a single word and is dropped
    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].text.starts_with("w0 "));
    assert!(chunks[1].text.starts_with("w8 "));
    assert!(chunks[0].text.ends_with("w9"));
    assert_eq!(chunks[2].text.split_whitespace().count(), 9);
    for c in &chunks { assert_eq!(c.parent_text, s.text); }

    let ids: std::collections::HashSet<_> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
    assert_eq!(ids.len(), chunks.len(), "chunk ids are unique");
}

#[test]
fn chunk_ids_are_stable_and_content_derived() {
    let processor = DataProcessor::new();
    let a = processor.chunk_section(&section(words(80, "a")));
    let b = processor.chunk_section(&section(words(80, "a")));
    let c = processor.chunk_section(&section(words(80, "c")));
    assert_eq!(a[0].chunk_id, b[0].chunk_id);
    assert_ne!(a[0].chunk_id, c[0].chunk_id);
}

#[test]
fn short_sections_are_skipped() {
    let chunks = DataProcessor::new().chunk_section(&section(words(49, "s")));
    assert!(chunks.is_empty());
}

#[test]
fn stats_count_by_section_and_period() {
    let processor = DataProcessor::with_config(ChunkingConfig { words_per_chunk: 10, overlap_words: 0, min_words: 5 });
    let chunks = processor.chunk_section(&section(words(20, "x")));
    let stats = chunk_stats(&chunks);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.by_section.get("risk_factors"), Some(&2));
    assert_eq!(stats.by_period.get("2024"), Some(&2));
    assert_eq!(stats.avg_words, 10);
}

#[test]
fn retrieval_defaults_are_valid() {
    let cfg = RetrievalConfig::default();
    cfg.validate().expect("defaults validate");
    assert_eq!((cfg.high, cfg.low, cfg.min_results, cfg.max_relaxations), (0.7, 0.3, 2, 3));
    assert_eq!((cfg.lambda, cfg.final_k), (0.7, 5));
}

#[test]
fn config_overrides_and_rejects_bad_weights() {
    let figment = Figment::new().merge(Toml::string("[retrieval]\nfinal_k = 3\nlambda = 0.5\n"));
    let config = Config::from_figment(figment).expect("config");
    let retrieval = config.retrieval().expect("retrieval");
    assert_eq!(retrieval.final_k, 3);
    assert_eq!(retrieval.lambda, 0.5);
    assert_eq!(retrieval.high, 0.7, "unset keys keep defaults");

    let bad = Figment::new().merge(Toml::string("[retrieval]\nw_k = 0.5\nw_e = 0.6\n"));
    assert!(Config::from_figment(bad).is_err());

    let inverted = RetrievalConfig { low: 0.8, high: 0.2, ..RetrievalConfig::default() };
    assert!(matches!(inverted.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn missing_section_uses_defaults() {
    let config = Config::from_figment(Figment::new()).expect("config");
    let retrieval = config.retrieval().expect("retrieval");
    assert_eq!(retrieval, RetrievalConfig::default());
}

fn chunk(id: &str, source: &str, period: &str) -> Chunk {
    Chunk {
        chunk_id: id.into(),
        text: format!("text {id}"),
        embedding: vec![],
        source_id: source.into(),
        filing_type: "10-K".into(),
        period: period.into(),
        section: "mda".into(),
        parent_text: String::new(),
        trimmed: false,
    }
}

#[test]
fn filter_matches_on_equality() {
    let f = ChunkFilter::source("A").with_period("2023");
    assert!(f.matches(&chunk("1", "A", "2023")));
    assert!(!f.matches(&chunk("2", "B", "2023")));
    assert!(!f.matches(&chunk("3", "A", "2022")));
    assert!(ChunkFilter::default().matches(&chunk("4", "Z", "1999")));
}

#[test]
fn result_drops_repeated_chunk_ids() {
    let entry = |id: &str| RetrievalEntry::from_candidate(filingrag_core::types::Candidate::new(chunk(id, "A", "2023"), 1.0), false);
    let result = RetrievalResult::from_entries(vec![entry("a"), entry("b"), entry("a")]);
    let ids: Vec<&str> = result.iter().map(|e| e.chunk_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b"]);
}

#[test]
fn cosine_handles_degenerate_vectors() {
    assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
}

#[test]
fn init_tracing_can_be_called_twice() {
    filingrag_core::logging::init_tracing();
    filingrag_core::logging::init_tracing();
}
