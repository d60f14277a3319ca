use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use filingrag_core::config::IngestConfig;
use filingrag_core::data_processor::{ChunkingConfig, DataProcessor};
use filingrag_core::traits::{Ingestor, VectorIndex};
use filingrag_core::types::{Chunk, ChunkFilter};

/// Ingests section text files laid out as
/// `<root>/<source_id>/<filing_type>/<period>/<section>.txt`.
///
/// A partition counts as indexed once the index holds any chunk for it.
pub struct DirectoryIngestor {
    root: PathBuf,
    processor: DataProcessor,
    index: Arc<dyn VectorIndex>,
}

impl DirectoryIngestor {
    pub fn new(root: impl Into<PathBuf>, chunking: ChunkingConfig, index: Arc<dyn VectorIndex>) -> Self {
        Self { root: root.into(), processor: DataProcessor::with_config(chunking), index }
    }

    pub fn from_config(cfg: &IngestConfig, base: &Path, index: Arc<dyn VectorIndex>) -> Self {
        let root = filingrag_core::config::resolve_with_base(base, &cfg.data_dir);
        Self::new(root, ChunkingConfig::from(cfg), index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl Ingestor for DirectoryIngestor {
    async fn is_indexed(&self, source_id: &str, filing_type: &str, period: &str) -> Result<bool> {
        let filter = ChunkFilter::source(source_id).with_filing_type(filing_type).with_period(period);
        Ok(self.index.count(&filter).await? > 0)
    }

    async fn ingest(&self, source_id: &str, filing_type: &str, period: &str) -> Result<Vec<Chunk>> {
        let processor = self.processor.clone();
        let root = self.root.clone();
        let (source_id, filing_type, period) = (source_id.to_string(), filing_type.to_string(), period.to_string());
        tokio::task::spawn_blocking(move || processor.process_partition(&root, &source_id, &filing_type, &period)).await?
    }
}
