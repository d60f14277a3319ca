//! filingrag-retrieval
//!
//! The retrieval pipeline over indexed filings: HyDE query expansion, MMR
//! diversity retrieval across periods, corrective relevance filtering and
//! cross-encoder reranking, plus the collaborators needed to run it
//! standalone (generators and a directory ingestor).

pub mod crag;
pub mod generate;
pub mod hyde;
pub mod ingest;
pub mod mmr;
pub mod pipeline;
pub mod rerank;

pub use crag::{band_for, RelevanceFilter};
pub use generate::{build_generator, HttpGenerator, TemplateGenerator};
pub use hyde::{hyde_instruction, QueryExpander};
pub use ingest::DirectoryIngestor;
pub use mmr::{mmr_select, union_by_id, DiversityRetriever};
pub use pipeline::{target_periods, PipelineBuilder, RetrievalPipeline, SearchRequest};
pub use rerank::{Reranked, Reranker};
