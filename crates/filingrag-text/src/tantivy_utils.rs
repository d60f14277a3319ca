use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};

/// Words that carry no topic in a question about a filing.
pub const QUERY_STOP_WORDS: &[&str] = &[
	"what","how","did","does","is","are","was","were","the","a","an","in","on","at","to","for","of",
	"and","or","but","about","their","its","they","it","this","that","these","those","with","from","tell",
	"me","us","our","your","my","has","have","had","been","be","do","say","says","said",
	"which","who","whom","whose","why","when","where","can","could","should","would","will","may","might",
];

/// Analyzer used for query keywords: split on non-alphanumerics, lower-case,
/// drop question stop words.
pub fn keyword_analyzer() -> TextAnalyzer {
	TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(QUERY_STOP_WORDS.iter().map(|s| s.to_string())))
		.build()
}
