//! Section files on disk → overlapping word-window chunks.
//!
//! Expected layout: `<root>/<source_id>/<filing_type>/<period>/<section>.txt`,
//! one file per filing section. Every chunk keeps its whole section as
//! `parent_text`.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::IngestConfig;
use crate::types::Chunk;

#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    pub words_per_chunk: usize,
    pub overlap_words: usize,
    /// Sections, and trailing windows, shorter than this are dropped.
    pub min_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { words_per_chunk: 400, overlap_words: 50, min_words: 50 }
    }
}

impl From<&IngestConfig> for ChunkingConfig {
    fn from(c: &IngestConfig) -> Self {
        Self { words_per_chunk: c.words_per_chunk, overlap_words: c.overlap_words, min_words: c.min_words }
    }
}

/// Raw text of one section of one filing.
#[derive(Debug, Clone)]
pub struct FilingSection {
    pub source_id: String,
    pub filing_type: String,
    pub period: String,
    pub section: String,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Read and chunk every section file of one `(source, filing type, period)` partition.
    /// A missing partition directory yields no chunks.
    pub fn process_partition(&self, root: &Path, source_id: &str, filing_type: &str, period: &str) -> Result<Vec<Chunk>> {
        let dir = partition_dir(root, source_id, filing_type, period);
        if !dir.is_dir() {
            debug!(dir = %dir.display(), "partition directory missing");
            return Ok(vec![]);
        }
        let sections = self.read_sections(&dir, source_id, filing_type, period)?;
        let chunks = self.chunk_sections(&sections);
        info!(source_id, filing_type, period, sections = sections.len(), chunks = chunks.len(), "processed partition");
        Ok(chunks)
    }

    pub fn chunk_sections(&self, sections: &[FilingSection]) -> Vec<Chunk> {
        sections.iter().flat_map(|s| self.chunk_section(s)).collect()
    }

    pub fn chunk_section(&self, section: &FilingSection) -> Vec<Chunk> {
        let cfg = &self.chunking_config;
        let words: Vec<&str> = section.text.split_whitespace().collect();
        if words.len() < cfg.min_words || words.is_empty() { return vec![]; }
        let step = cfg.words_per_chunk.saturating_sub(cfg.overlap_words).max(1);
        let mut chunks = Vec::new();
        let mut start = 0usize;
        while start < words.len() {
            let end = (start + cfg.words_per_chunk).min(words.len());
            let window = &words[start..end];
            if window.len() < cfg.min_words { break; }
            let text = window.join(" ");
            let index = chunks.len();
            chunks.push(Chunk {
                chunk_id: chunk_id(section, index, &text),
                text,
                embedding: Vec::new(),
                source_id: section.source_id.clone(),
                filing_type: section.filing_type.clone(),
                period: section.period.clone(),
                section: section.section.clone(),
                parent_text: section.text.clone(),
                trimmed: false,
            });
            start += step;
        }
        chunks
    }

    fn read_sections(&self, dir: &Path, source_id: &str, filing_type: &str, period: &str) -> Result<Vec<FilingSection>> {
        let mut sections = Vec::new();
        for path in self.list_txt_files(dir) {
            let Some(section) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else { continue };
            sections.push(FilingSection {
                source_id: source_id.to_string(),
                filing_type: filing_type.to_string(),
                period: period.to_string(),
                section,
                text: self.read_file_content(&path)?,
            });
        }
        Ok(sections)
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        match fs::read_to_string(file_path) {
            Ok(content) => Ok(content),
            Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
        }
    }

    fn list_txt_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut txt_files = Vec::new();
        for entry in walkdir::WalkDir::new(root).max_depth(1).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path(); if path.extension().and_then(|s| s.to_str()) == Some("txt") { txt_files.push(path.to_path_buf()); }
        }
        txt_files.sort(); txt_files
    }
}

pub fn partition_dir(root: &Path, source_id: &str, filing_type: &str, period: &str) -> PathBuf {
    root.join(source_id).join(filing_type).join(period)
}

/// Content-derived chunk identity: blake3 over the partition, section,
/// position and text.
pub fn chunk_id(section: &FilingSection, index: usize, text: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in [&section.source_id, &section.filing_type, &section.period, &section.section] {
        hasher.update(part.as_bytes());
        hasher.update(&[0x1f]);
    }
    hasher.update(&(index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkStats {
    pub total: usize,
    pub by_section: BTreeMap<String, usize>,
    pub by_period: BTreeMap<String, usize>,
    pub avg_words: usize,
}

pub fn chunk_stats(chunks: &[Chunk]) -> ChunkStats {
    if chunks.is_empty() { return ChunkStats::default(); }
    let mut stats = ChunkStats { total: chunks.len(), ..ChunkStats::default() };
    let mut words = 0usize;
    for c in chunks {
        *stats.by_section.entry(c.section.clone()).or_default() += 1;
        *stats.by_period.entry(c.period.clone()).or_default() += 1;
        words += c.text.split_whitespace().count();
    }
    stats.avg_words = words / chunks.len();
    stats
}
