//! Hypothetical document expansion: the question is rewritten into a passage
//! in the register of the filings before it is embedded.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use filingrag_core::config::GeneratorConfig;
use filingrag_core::traits::{GenerationRequest, Generator};

pub fn hyde_instruction(document_kind: &str) -> String {
    format!(
        "Write a single passage, in the formal wording of a {document_kind}, that directly \
         addresses the question. Reply with the passage only, without headings or commentary."
    )
}

/// One generator attempt per query, bounded by `timeout`. Never fails: any
/// error, timeout or blank output yields the question unchanged.
#[derive(Clone)]
pub struct QueryExpander {
    generator: Option<Arc<dyn Generator>>,
    timeout: Duration,
    document_kind: String,
}

impl QueryExpander {
    pub fn new(generator: Option<Arc<dyn Generator>>, timeout: Duration) -> Self {
        Self { generator, timeout, document_kind: GeneratorConfig::default().document_kind }
    }

    /// Expander that always returns the question as-is.
    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub fn with_document_kind(mut self, document_kind: impl Into<String>) -> Self {
        self.document_kind = document_kind.into();
        self
    }

    pub fn request(&self, query: &str) -> GenerationRequest {
        GenerationRequest { instruction: hyde_instruction(&self.document_kind), question: query.to_string() }
    }

    pub async fn expand(&self, query: &str) -> String {
        let Some(generator) = &self.generator else { return query.to_string() };
        let request = self.request(query);
        match tokio::time::timeout(self.timeout, generator.generate(&request)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                debug!(chars = text.len(), "query expanded");
                text.trim().to_string()
            }
            Ok(Ok(_)) => {
                warn!(reason = "empty output", "expansion failed; using raw query");
                query.to_string()
            }
            Ok(Err(e)) => {
                warn!(reason = %e, "expansion failed; using raw query");
                query.to_string()
            }
            Err(_) => {
                warn!(reason = "timeout", timeout_ms = self.timeout.as_millis() as u64, "expansion failed; using raw query");
                query.to_string()
            }
        }
    }
}
