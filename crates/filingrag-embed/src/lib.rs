//! filingrag-embed
//!
//! Candle-backed models: the BGE-M3 bi-encoder used as [`Embedder`] and a BGE
//! cross-encoder used as [`Scorer`]. Setting `APP_USE_FAKE_EMBEDDINGS=1` (or
//! `models.use_fake`) swaps both for hash-based fakes that need no weights.

use anyhow::{Result, anyhow};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use filingrag_core::config::ModelConfig;
use filingrag_core::traits::Embedder;

pub mod device;
pub mod fake;
pub mod handles;
pub mod pool;
pub mod rerank;
pub mod tokenize;

pub use fake::{FakeEmbedder, LexicalScorer, FAKE_DIM};
pub use handles::ModelHandles;
pub use pool::{masked_mean_l2, pool_l2, Pooling};
pub use rerank::CrossEncoder;

use crate::device::select_device;
use crate::tokenize::{stack_rows, tokenize_on_device};

/// Texts per forward pass.
const EMBED_BATCH: usize = 16;

pub struct BgeM3Embedder { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, dim: usize, max_len: usize, pooling: Pooling }

impl BgeM3Embedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(dir = %model_dir.display(), "loading BGE-M3 embedder");
        let tokenizer = load_tokenizer(model_dir)?;
        let config: XLMRobertaConfig = load_config(model_dir)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        info!(dim = config.hidden_size, max_len, "BGE-M3 embedder ready");
        Ok(Self { model, tokenizer, device, dim: config.hidden_size, max_len, pooling: Pooling::Cls })
    }

    pub fn with_pooling(mut self, pooling: Pooling) -> Self { self.pooling = pooling; self }

    fn embed_rows(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let rows = texts.iter().map(|t| tokenize_on_device(&self.tokenizer, t, self.max_len, &self.device)).collect::<Result<Vec<_>>>()?;
        let (input_ids, attention_mask) = stack_rows(rows)?;
        let token_type_ids = Tensor::zeros(input_ids.shape(), DType::I64, &self.device)?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = pool_l2(&hidden, &attention_mask, self.pooling)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2::<f32>()?)
    }
}

impl Embedder for BgeM3Embedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH) { out.extend(self.embed_rows(batch)?); }
        debug!(texts = texts.len(), elapsed_ms = start.elapsed().as_millis() as u64, "embedded batch");
        Ok(out)
    }
}

/// Embedder selected by environment alone, as in tests and scripts.
pub fn get_default_embedder() -> Result<Box<dyn Embedder>> {
    load_embedder(&ModelConfig::default())
}

pub fn load_embedder(cfg: &ModelConfig) -> Result<Box<dyn Embedder>> {
    if cfg.use_fake || use_fake_from_env() { info!("using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(FAKE_DIM))); }
    let dir = resolve_model_dir(cfg.embedder_dir.as_deref(), "APP_MODEL_DIR", "bge-m3")?;
    Ok(Box::new(BgeM3Embedder::load(&dir, cfg.max_len)?))
}

pub(crate) fn use_fake_from_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub(crate) fn load_tokenizer(model_dir: &Path) -> Result<Tokenizer> {
    let tokenizer_path = model_dir.join("tokenizer.json");
    Tokenizer::from_file(&tokenizer_path).map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))
}

pub(crate) fn load_config(model_dir: &Path) -> Result<XLMRobertaConfig> {
    let config_path = model_dir.join("config.json");
    Ok(serde_json::from_str(&std::fs::read_to_string(&config_path)?)?)
}

/// Prefer `model.safetensors`, fall back to a pickled `pytorch_model.bin`.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        // SAFETY: the weights file is not modified while the model is alive.
        return Ok(unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors], DType::F32, device)? });
    }
    let weights_path = model_dir.join("pytorch_model.bin");
    let weights = candle_core::pickle::read_all(&weights_path)?;
    let weights_map: HashMap<String, Tensor> = weights.into_iter().collect();
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}

/// Locate a model directory: explicit config, then `env_key`, then
/// `models/<name>` next to or above the working directory.
pub fn resolve_model_dir(explicit: Option<&str>, env_key: &str, name: &str) -> Result<PathBuf> {
    if let Some(dir) = explicit { let p = filingrag_core::config::expand_path(dir); if p.exists() { return Ok(p); } warn!(dir = %p.display(), "configured model dir missing"); }
    if let Ok(dir) = std::env::var(env_key) { let p = PathBuf::from(&dir); if p.exists() { debug!(env_key, dir = %p.display(), "model dir from env"); return Ok(p); } }
    for candidate in [Path::new("../models").join(name), Path::new("models").join(name)] { if candidate.exists() { return Ok(candidate); } }
    Err(anyhow!("Could not locate model directory for {}", name))
}
