use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use filingrag_core::config::ModelConfig;
use filingrag_core::traits::{Embedder, Scorer};

use crate::load_embedder;
use crate::rerank::load_scorer;

/// Models loaded once per process and shared by every query.
///
/// The embedder is required. A scorer that fails to load is logged and left
/// out, which makes the reranking stage run degraded.
#[derive(Clone)]
pub struct ModelHandles {
    pub embedder: Arc<dyn Embedder>,
    pub scorer: Option<Arc<dyn Scorer>>,
}

impl ModelHandles {
    pub fn load(cfg: &ModelConfig) -> Result<Self> {
        let embedder: Arc<dyn Embedder> = Arc::from(load_embedder(cfg)?);
        let scorer: Option<Arc<dyn Scorer>> = match load_scorer(cfg) {
            Ok(s) => Some(Arc::from(s)),
            Err(e) => { warn!(error = %e, "cross-encoder unavailable; results will be unreranked"); None }
        };
        info!(dim = embedder.dim(), reranker = scorer.is_some(), "models loaded");
        Ok(Self { embedder, scorer })
    }

    pub fn shutdown(self) {
        let holders = Arc::strong_count(&self.embedder);
        drop(self);
        info!(remaining_embedder_refs = holders.saturating_sub(1), "models released");
    }
}
