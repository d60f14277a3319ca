//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Typed sections (`retrieval`, `index`, `models`, `generator`, `ingest`) are
//! extracted with [`Config::get`] and fall back to their documented defaults
//! for any missing key.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract a section, using its defaults when the key is absent entirely.
    pub fn section<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }

    pub fn retrieval(&self) -> anyhow::Result<RetrievalConfig> {
        let cfg: RetrievalConfig = self.section("retrieval")?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.figment.find_value("retrieval").is_ok() {
            self.retrieval()?;
        }
        if self.figment.find_value("ingest").is_ok() {
            let ingest: IngestConfig = self.get("ingest")?;
            ingest.validate()?;
        }
        Ok(())
    }
}

/// Every tunable of the retrieval stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Relevance score strictly above this is CORRECT.
    pub high: f32,
    /// Relevance score below this is INCORRECT.
    pub low: f32,
    /// Minimum number of candidates the relevance filter hands on.
    pub min_results: usize,
    /// Threshold relaxations attempted before the best-effort fallback.
    pub max_relaxations: usize,
    /// Amount subtracted from both thresholds per relaxation.
    pub relax_step: f32,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure diversity.
    pub lambda: f32,
    /// Weight of keyword overlap in the relevance score.
    pub w_k: f32,
    /// Weight of embedding similarity in the relevance score.
    pub w_e: f32,
    pub final_k: usize,
    /// Nearest neighbours fetched per period before MMR.
    pub per_partition_k: usize,
    /// Candidates MMR selects from the union.
    pub n_results: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            high: 0.7,
            low: 0.3,
            min_results: 2,
            max_relaxations: 3,
            relax_step: 0.1,
            lambda: 0.7,
            w_k: 0.4,
            w_e: 0.6,
            final_k: 5,
            per_partition_k: 20,
            n_results: 20,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        if !unit(self.low) || !unit(self.high) || self.low > self.high {
            return Err(Error::InvalidConfig(format!(
                "thresholds must satisfy 0 <= low <= high <= 1 (low={}, high={})",
                self.low, self.high
            )));
        }
        if !unit(self.w_k) || !unit(self.w_e) || (self.w_k + self.w_e - 1.0).abs() > 1e-4 {
            return Err(Error::InvalidConfig(format!("w_k + w_e must equal 1 (w_k={}, w_e={})", self.w_k, self.w_e)));
        }
        if !unit(self.lambda) {
            return Err(Error::InvalidConfig(format!("lambda must be within [0, 1], got {}", self.lambda)));
        }
        if self.relax_step <= 0.0 {
            return Err(Error::InvalidConfig("relax_step must be positive".into()));
        }
        if self.final_k == 0 || self.min_results == 0 {
            return Err(Error::InvalidConfig("final_k and min_results must be at least 1".into()));
        }
        if self.per_partition_k == 0 || self.n_results == 0 {
            return Err(Error::InvalidConfig("per_partition_k and n_results must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub uri: String,
    pub table: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { uri: "~/.filingrag/lancedb".to_string(), table: "filing_chunks".to_string() }
    }
}

impl IndexConfig {
    pub fn resolved_uri(&self, base: &Path) -> PathBuf {
        resolve_with_base(base, &self.uri)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub embedder_dir: Option<String>,
    pub reranker_dir: Option<String>,
    /// Hash-based fakes instead of model weights.
    pub use_fake: bool,
    pub max_len: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self { embedder_dir: None, reranker_dir: None, use_fake: false, max_len: 256 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Template,
    Http,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub kind: GeneratorKind,
    /// Base URL of an OpenAI-compatible server, e.g. `http://localhost:11434/v1`.
    pub endpoint: Option<String>,
    pub model: Option<String>,
    /// Name of the env var holding the bearer token, if the server needs one.
    pub api_key_env: Option<String>,
    pub timeout_ms: u64,
    /// Document register the hypothetical passage imitates.
    pub document_kind: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kind: GeneratorKind::Template,
            endpoint: None,
            model: None,
            api_key_env: None,
            timeout_ms: 8_000,
            document_kind: "SEC 10-K annual report".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub data_dir: String,
    pub words_per_chunk: usize,
    pub overlap_words: usize,
    pub min_words: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { data_dir: "data/filings".to_string(), words_per_chunk: 400, overlap_words: 50, min_words: 50 }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.words_per_chunk == 0 || self.overlap_words >= self.words_per_chunk {
            return Err(Error::InvalidConfig(format!(
                "overlap_words ({}) must be smaller than words_per_chunk ({})",
                self.overlap_words, self.words_per_chunk
            )));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
