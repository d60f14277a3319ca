//! End-to-end retrieval: ingestion gate, expansion, embedding, MMR,
//! relevance filtering, reranking and result assembly.

use chrono::Datelike;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use filingrag_core::config::{Config, GeneratorConfig, IndexConfig, IngestConfig, ModelConfig, RetrievalConfig};
use filingrag_core::error::{Error, Result};
use filingrag_core::traits::{Embedder, Ingestor, Scorer, VectorIndex};
use filingrag_core::types::{Candidate, RetrievalEntry, RetrievalResult};
use filingrag_embed::ModelHandles;
use filingrag_vector::LanceIndex;

use crate::crag::RelevanceFilter;
use crate::generate::build_generator;
use crate::hyde::QueryExpander;
use crate::ingest::DirectoryIngestor;
use crate::mmr::DiversityRetriever;
use crate::rerank::{Reranked, Reranker};

pub const DEFAULT_FILING_TYPE: &str = "10-K";
pub const DEFAULT_YEARS: usize = 3;

/// One question against one issuer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub source_id: String,
    /// Empty matches every filing type.
    pub filing_type: String,
    /// Number of most recent calendar years to search.
    pub years: usize,
    /// Explicit periods; overrides `years`.
    pub periods: Option<Vec<String>>,
    /// Overrides `retrieval.final_k`.
    pub final_k: Option<usize>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            source_id: source_id.into(),
            filing_type: DEFAULT_FILING_TYPE.to_string(),
            years: DEFAULT_YEARS,
            periods: None,
            final_k: None,
        }
    }

    pub fn filing_type(mut self, filing_type: impl Into<String>) -> Self {
        self.filing_type = filing_type.into();
        self
    }

    pub fn years(mut self, years: usize) -> Self {
        self.years = years;
        self
    }

    pub fn periods<I, S>(mut self, periods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.periods = Some(periods.into_iter().map(Into::into).collect());
        self
    }

    pub fn final_k(mut self, final_k: usize) -> Self {
        self.final_k = Some(final_k);
        self
    }

    pub fn resolved_periods(&self, current_year: i32) -> Vec<String> {
        self.periods.clone().unwrap_or_else(|| target_periods(self.years, current_year))
    }
}

/// The `years` most recent calendar years, newest first.
pub fn target_periods(years: usize, current_year: i32) -> Vec<String> {
    (0..years).map(|i| (i64::from(current_year) - i as i64).to_string()).collect()
}

pub struct PipelineBuilder {
    config: RetrievalConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    scorer: Option<Arc<dyn Scorer>>,
    expander: QueryExpander,
    ingestor: Option<Arc<dyn Ingestor>>,
}

impl PipelineBuilder {
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn scorer(mut self, scorer: Option<Arc<dyn Scorer>>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn expander(mut self, expander: QueryExpander) -> Self {
        self.expander = expander;
        self
    }

    pub fn ingestor(mut self, ingestor: Arc<dyn Ingestor>) -> Self {
        self.ingestor = Some(ingestor);
        self
    }

    /// Validate the configuration and check the index was built for this
    /// embedder. A width mismatch refuses to build the pipeline.
    pub async fn connect(self) -> Result<RetrievalPipeline> {
        self.config.validate()?;
        let stored = self.index.stored_dim().await.map_err(|e| Error::IndexUnavailable(format!("{e:#}")))?;
        let dim = self.embedder.dim();
        if let Some(index_dim) = stored {
            if index_dim != dim {
                return Err(Error::DimensionMismatch { index: index_dim, embedder: dim });
            }
        }
        info!(dim, reranker = self.scorer.is_some(), ingestion = self.ingestor.is_some(), "retrieval pipeline ready");
        Ok(RetrievalPipeline {
            retriever: DiversityRetriever::new(self.index.clone(), &self.config),
            filter: RelevanceFilter::new(&self.config),
            reranker: Reranker::new(self.scorer),
            expander: self.expander,
            embedder: self.embedder,
            index: self.index,
            ingestor: self.ingestor,
            config: self.config,
        })
    }
}

/// Stateless between calls; concurrent searches share the embedder, the
/// scorer and the index.
pub struct RetrievalPipeline {
    config: RetrievalConfig,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    ingestor: Option<Arc<dyn Ingestor>>,
    expander: QueryExpander,
    retriever: DiversityRetriever,
    filter: RelevanceFilter,
    reranker: Reranker,
}

impl RetrievalPipeline {
    pub fn builder(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> PipelineBuilder {
        PipelineBuilder {
            config: RetrievalConfig::default(),
            embedder,
            index,
            scorer: None,
            expander: QueryExpander::disabled(),
            ingestor: None,
        }
    }

    /// Wire every collaborator from configuration: models, LanceDB index,
    /// generator and the directory ingestor. Relative paths resolve against `base`.
    pub async fn from_config(config: &Config, base: &Path) -> anyhow::Result<Self> {
        let retrieval = config.retrieval()?;
        let models: ModelConfig = config.section("models")?;
        let index_cfg: IndexConfig = config.section("index")?;
        let generator_cfg: GeneratorConfig = config.section("generator")?;
        let ingest_cfg: IngestConfig = config.section("ingest")?;

        let handles = ModelHandles::load(&models)?;
        let uri = index_cfg.resolved_uri(base);
        let index: Arc<dyn VectorIndex> = Arc::new(LanceIndex::open(&uri.to_string_lossy(), &index_cfg.table, handles.embedder.dim()).await?);
        let expander = QueryExpander::new(build_generator(&generator_cfg)?, Duration::from_millis(generator_cfg.timeout_ms))
            .with_document_kind(generator_cfg.document_kind.clone());
        let ingestor = Arc::new(DirectoryIngestor::from_config(&ingest_cfg, base, index.clone()));

        Ok(Self::builder(handles.embedder, index)
            .config(retrieval)
            .scorer(handles.scorer)
            .expander(expander)
            .ingestor(ingestor)
            .connect()
            .await?)
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<RetrievalResult> {
        let start = Instant::now();
        let periods = request.resolved_periods(chrono::Utc::now().year());
        let final_k = request.final_k.unwrap_or(self.config.final_k);
        if final_k == 0 {
            return Err(Error::InvalidConfig("final_k must be at least 1".into()));
        }
        let filing_type = (!request.filing_type.is_empty()).then_some(request.filing_type.as_str());

        self.ensure_indexed(&request.source_id, &request.filing_type, &periods).await;

        let expanded = self.expander.expand(&request.query).await;
        let mut vectors = self.embed(vec![expanded, request.query.clone()]).await?.into_iter();
        let (Some(query_vector), Some(raw_vector)) = (vectors.next(), vectors.next()) else {
            return Err(Error::Embedding("embedder returned fewer vectors than texts".into()));
        };

        let candidates = self.retriever.retrieve(&query_vector, &request.source_id, filing_type, &periods).await?;
        if candidates.is_empty() {
            info!(source_id = %request.source_id, ?periods, "no candidates for filter");
            return Ok(RetrievalResult::empty());
        }

        let filtered = self.filter.filter(&request.query, &raw_vector, &candidates);
        let Reranked { candidates: ranked, degraded } = self.rerank(&request.query, filtered, final_k).await;

        let result = RetrievalResult::from_entries(ranked.into_iter().map(|c| RetrievalEntry::from_candidate(c, degraded)));
        info!(
            source_id = %request.source_id,
            retrieved = candidates.len(),
            returned = result.len(),
            degraded,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search complete"
        );
        Ok(result)
    }

    /// Ingest, embed and store every requested period the index does not
    /// hold yet. Failures are logged and the search continues with whatever
    /// is indexed.
    async fn ensure_indexed(&self, source_id: &str, filing_type: &str, periods: &[String]) {
        let Some(ingestor) = &self.ingestor else { return };
        for period in periods {
            match ingestor.is_indexed(source_id, filing_type, period).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    warn!(source_id, period = %period, error = %e, "index check failed; skipping ingestion");
                    continue;
                }
            }
            match self.ingest_with(ingestor.as_ref(), source_id, filing_type, period).await {
                Ok(0) => warn!(source_id, filing_type, period = %period, "nothing to ingest"),
                Ok(added) => info!(source_id, filing_type, period = %period, added, "partition ingested"),
                Err(e) => warn!(source_id, period = %period, error = %e, "ingestion failed"),
            }
        }
    }

    /// Ingest one partition through the configured ingestor, embed it and
    /// store the chunks not indexed yet. Returns how many were added.
    pub async fn ingest_partition(&self, source_id: &str, filing_type: &str, period: &str) -> Result<usize> {
        let Some(ingestor) = &self.ingestor else {
            return Err(Error::Ingestion("no ingestor configured".into()));
        };
        self.ingest_with(ingestor.as_ref(), source_id, filing_type, period).await
    }

    async fn ingest_with(&self, ingestor: &dyn Ingestor, source_id: &str, filing_type: &str, period: &str) -> Result<usize> {
        let partition = format!("{source_id}/{filing_type}/{period}");
        let mut chunks = ingestor
            .ingest(source_id, filing_type, period)
            .await
            .map_err(|e| Error::Ingestion(format!("{partition}: {e:#}")))?;
        if chunks.is_empty() { return Ok(0); }
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embed(texts).await?;
        for (chunk, embedding) in chunks.iter_mut().zip(embeddings) { chunk.embedding = embedding; }
        self.index.add(&chunks).await.map_err(|e| Error::Ingestion(format!("{partition}: {e:#}")))
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let embedder = self.embedder.clone();
        let count = texts.len();
        let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
            .await
            .map_err(|e| Error::Embedding(e.to_string()))?
            .map_err(|e| Error::Embedding(format!("{e:#}")))?;
        if vectors.len() != count {
            return Err(Error::Embedding(format!("expected {count} vectors, got {}", vectors.len())));
        }
        debug!(count, "embedded");
        Ok(vectors)
    }

    async fn rerank(&self, query: &str, candidates: Vec<Candidate>, final_k: usize) -> Reranked {
        if !self.reranker.is_available() {
            return self.reranker.rerank(query, candidates, final_k);
        }
        let reranker = self.reranker.clone();
        let fallback = candidates.clone();
        let query = query.to_string();
        match tokio::task::spawn_blocking(move || reranker.rerank(&query, candidates, final_k)).await {
            Ok(reranked) => reranked,
            Err(e) => {
                warn!(error = %e, "rerank task failed; skipping rerank");
                Reranker::default().rerank("", fallback, final_k)
            }
        }
    }
}
