use crate::keywords::mentions_any;

/// Split on whitespace that follows `.`, `!` or `?`. Terminators stay with
/// their sentence; empty pieces are skipped.
pub fn split_sentences(text: &str) -> Vec<&str> {
	let mut out = Vec::new();
	let mut start = 0usize;
	let mut prev_terminal = false;
	for (i, ch) in text.char_indices() {
		if ch.is_whitespace() && prev_terminal {
			let piece = text[start..i].trim();
			if !piece.is_empty() { out.push(piece); }
			start = i;
		}
		prev_terminal = matches!(ch, '.' | '!' | '?');
	}
	let tail = text[start..].trim();
	if !tail.is_empty() { out.push(tail); }
	out
}

/// Sentences of `text` that mention at least one keyword, joined by a space.
/// `None` when no sentence matches.
pub fn relevant_sentences(text: &str, keywords: &[String]) -> Option<String> {
	let picked: Vec<&str> = split_sentences(text).into_iter().filter(|s| mentions_any(&s.to_lowercase(), keywords)).collect();
	if picked.is_empty() { None } else { Some(picked.join(" ")) }
}
