//! Generators available to the query expander.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use filingrag_core::config::{GeneratorConfig, GeneratorKind};
use filingrag_core::traits::{GenerationRequest, Generator};
use filingrag_text::extract_keywords;

/// Topic sentences used by [`TemplateGenerator`]. A topic fires when any cue
/// appears in the question.
const TOPICS: &[(&[&str], &str)] = &[
    (
        &["risk", "danger", "threat"],
        "The Company is subject to various risks and uncertainties that could materially adversely affect its business, financial condition, and results of operations.",
    ),
    (
        &["china", "chinese", "asia", "international", "foreign"],
        "The Company's operations outside the United States are subject to risks associated with international operations, including regulatory, political, and economic risks in foreign jurisdictions.",
    ),
    (
        &["revenue", "sales", "income", "profit", "earnings"],
        "Net revenues and operating income reflect the Company's financial performance across its reportable segments for the fiscal year.",
    ),
    (
        &["debt", "borrow", "credit", "loan", "leverage"],
        "The Company's indebtedness and credit facilities may limit its financial flexibility and its ability to fund operations and capital expenditures.",
    ),
    (
        &["competition", "competitor", "compete", "market"],
        "The Company faces intense competition from existing and new market participants, which may affect pricing, market share, and overall financial performance.",
    ),
    (
        &["ai", "artificial intelligence", "technology", "innovation"],
        "The Company continues to invest in research and development of emerging technologies, including artificial intelligence, to maintain its competitive position.",
    ),
    (
        &["supply", "supplier", "manufacturing"],
        "The Company relies on third-party suppliers and manufacturers, which exposes it to supply chain disruptions, component shortages, and quality control risks.",
    ),
    (
        &["regulation", "regulatory", "compliance", "law", "legal"],
        "The Company is subject to extensive government regulation in the jurisdictions in which it operates, which may require significant compliance costs.",
    ),
];

const MAX_TOPIC_SENTENCES: usize = 2;

/// Offline generator: question, up to two boilerplate sentences for the
/// topics it touches, then its keywords.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn draft(&self, question: &str) -> String {
        let lowered = question.to_lowercase();
        let tokens: Vec<&str> = lowered.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).collect();
        let cue_hit = |cue: &str| {
            if cue.contains(' ') { return lowered.contains(cue); }
            tokens.iter().any(|t| *t == cue || (cue.len() >= 4 && t.starts_with(cue)))
        };
        let mut parts = vec![question.trim().to_string()];
        parts.extend(
            TOPICS.iter().filter(|(cues, _)| cues.iter().any(|c| cue_hit(c))).take(MAX_TOPIC_SENTENCES).map(|(_, s)| s.to_string()),
        );
        let keywords = extract_keywords(question);
        if !keywords.is_empty() { parts.push(keywords.join(" ")); }
        parts.join(" ")
    }
}

#[async_trait]
impl Generator for TemplateGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        Ok(self.draft(&request.question))
    }
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Clone)]
pub struct HttpGenerator {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), model: model.into(), api_key })
    }

    pub fn from_config(cfg: &GeneratorConfig) -> Result<Self> {
        let endpoint = cfg.endpoint.clone().ok_or_else(|| anyhow!("generator.endpoint is required for kind = \"http\""))?;
        let model = cfg.model.clone().ok_or_else(|| anyhow!("generator.model is required for kind = \"http\""))?;
        let api_key = cfg.api_key_env.as_deref().and_then(|k| std::env::var(k).ok());
        Self::new(endpoint, model, api_key, Duration::from_millis(cfg.timeout_ms))
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.instruction },
                { "role": "user", "content": request.question },
            ],
            "temperature": 0.0,
            "stream": false,
        });
        let mut req = self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(key) = &self.api_key { req = req.bearer_auth(key); }
        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("generator returned {}: {}", status, text);
        }
        let completion: ChatCompletion = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("generator returned no choices"))
    }
}

/// Generator selected by `generator.kind`; `None` disables expansion.
pub fn build_generator(cfg: &GeneratorConfig) -> Result<Option<Arc<dyn Generator>>> {
    let generator: Option<Arc<dyn Generator>> = match cfg.kind {
        GeneratorKind::Template => Some(Arc::new(TemplateGenerator)),
        GeneratorKind::Http => Some(Arc::new(HttpGenerator::from_config(cfg)?)),
        GeneratorKind::None => None,
    };
    info!(kind = ?cfg.kind, "query expansion generator configured");
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_caps_topic_sentences() {
        let g = TemplateGenerator;
        let out = g.draft("What debt risks does the company face from China?");
        assert!(out.starts_with("What debt risks does the company face from China?"));
        assert!(out.contains("subject to various risks"));
        assert!(out.contains("outside the United States"));
        assert!(!out.contains("indebtedness"), "third topic must be dropped");
        assert!(out.ends_with("debt risks company face china"));
    }

    #[test]
    fn template_cues_match_whole_words() {
        let g = TemplateGenerator;
        // "said" must not fire the AI topic
        let out = g.draft("What was said about dividends?");
        assert!(!out.contains("artificial intelligence"));
        assert!(g.draft("Any AI investments?").contains("artificial intelligence"));
    }

    #[test]
    fn http_generator_requires_endpoint_and_model() {
        let cfg = GeneratorConfig { kind: GeneratorKind::Http, ..GeneratorConfig::default() };
        assert!(HttpGenerator::from_config(&cfg).is_err());
        assert!(build_generator(&cfg).is_err());
    }

    #[test]
    fn none_kind_disables_generation() {
        let cfg = GeneratorConfig { kind: GeneratorKind::None, ..GeneratorConfig::default() };
        assert!(build_generator(&cfg).unwrap().is_none());
    }
}
