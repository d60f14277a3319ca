use anyhow::Result;
use std::path::Path;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaForSequenceClassification};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use filingrag_core::config::ModelConfig;
use filingrag_core::traits::Scorer;

use crate::device::select_device;
use crate::fake::LexicalScorer;
use crate::tokenize::{stack_rows, tokenize_pair_on_device};
use crate::{load_config, load_tokenizer, load_weights, resolve_model_dir, use_fake_from_env};

/// Pairs per forward pass.
const SCORE_BATCH: usize = 8;

/// XLM-RoBERTa sequence classifier with a single relevance logit
/// (`bge-reranker-base` / `bge-reranker-v2-m3`). Scores are the sigmoid of
/// the logit, in `(0, 1)`.
pub struct CrossEncoder { model: XLMRobertaForSequenceClassification, tokenizer: Tokenizer, device: Device, max_len: usize }

impl CrossEncoder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading cross-encoder");
        let tokenizer = load_tokenizer(model_dir)?;
        let config: XLMRobertaConfig = load_config(model_dir)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaForSequenceClassification::new(1, &config, vb)?;
        Ok(Self { model, tokenizer, device, max_len })
    }

    fn score_rows(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let rows = texts.iter().map(|t| tokenize_pair_on_device(&self.tokenizer, query, t, self.max_len, &self.device)).collect::<Result<Vec<_>>>()?;
        let (input_ids, attention_mask) = stack_rows(rows)?;
        let token_type_ids = Tensor::zeros(input_ids.shape(), DType::I64, &self.device)?;
        let logits = self.model.forward(&input_ids, &attention_mask, &token_type_ids)?;
        let probs = candle_nn::ops::sigmoid(&logits.to_dtype(DType::F32)?)?;
        Ok(probs.flatten_all()?.to_device(&Device::Cpu)?.to_vec1::<f32>()?)
    }
}

impl Scorer for CrossEncoder {
    fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f32>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(SCORE_BATCH) { out.extend(self.score_rows(query, batch)?); }
        debug!(pairs = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "cross-encoder scored");
        Ok(out)
    }
}

pub fn load_scorer(cfg: &ModelConfig) -> Result<Box<dyn Scorer>> {
    if cfg.use_fake || use_fake_from_env() { info!("using LexicalScorer"); return Ok(Box::new(LexicalScorer)); }
    let dir = resolve_model_dir(cfg.reranker_dir.as_deref(), "APP_RERANKER_DIR", "bge-reranker-base")?;
    Ok(Box::new(CrossEncoder::load(&dir, cfg.max_len.max(512))?))
}
