//! filingrag-text
//!
//! Lexical helpers for relevance filtering: query keyword extraction through a
//! tantivy analyzer, keyword overlap and relevant-sentence extraction.

pub mod keywords;
pub mod sentences;
pub mod tantivy_utils;

pub use keywords::{extract_keywords, keyword_overlap, NEUTRAL_OVERLAP};
pub use sentences::{relevant_sentences, split_sentences};
