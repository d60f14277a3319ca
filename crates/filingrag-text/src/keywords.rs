use tantivy::tokenizer::TokenStream;

use crate::tantivy_utils::keyword_analyzer;

/// Keywords shorter than this are ignored.
const MIN_KEYWORD_CHARS: usize = 3;

/// Overlap reported for a query with no keywords at all.
pub const NEUTRAL_OVERLAP: f32 = 0.5;

/// Case-folded, stop-word-filtered, alphabetic query terms in first-seen order,
/// without repeats.
pub fn extract_keywords(query: &str) -> Vec<String> {
	let mut analyzer = keyword_analyzer();
	let mut stream = analyzer.token_stream(query);
	let mut out: Vec<String> = Vec::new();
	while stream.advance() {
		let text = &stream.token().text;
		if text.chars().count() < MIN_KEYWORD_CHARS || !text.chars().all(char::is_alphabetic) { continue; }
		if !out.iter().any(|k| k == text) { out.push(text.clone()); }
	}
	out
}

/// True when `lowered` contains at least one keyword. `lowered` must already
/// be lower-case; keywords match as substrings so `tariff` hits `tariffs`.
pub fn mentions_any(lowered: &str, keywords: &[String]) -> bool {
	keywords.iter().any(|k| lowered.contains(k.as_str()))
}

/// Fraction of `keywords` present in `text`, in `[0, 1]`.
pub fn keyword_overlap(keywords: &[String], text: &str) -> f32 {
	if keywords.is_empty() { return NEUTRAL_OVERLAP; }
	let lowered = text.to_lowercase();
	let hits = keywords.iter().filter(|k| lowered.contains(k.as_str())).count();
	hits as f32 / keywords.len() as f32
}
