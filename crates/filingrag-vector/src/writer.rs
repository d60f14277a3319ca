//! Chunks ⇄ Arrow record batches.
use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, StringArray};
use std::sync::Arc;

use filingrag_core::error::Error;
use filingrag_core::types::{Chunk, Neighbor};

use crate::schema::{build_chunk_schema, VECTOR_COLUMN};

pub fn chunks_to_record_batch(chunks: &[Chunk], dim: usize) -> Result<RecordBatch> {
	if let Some(bad) = chunks.iter().find(|c| c.embedding.len() != dim) {
		return Err(Error::DimensionMismatch { index: dim, embedder: bad.embedding.len() }.into());
	}
	let vectors = chunks.iter().map(|c| Some(c.embedding.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	let record_batch = RecordBatch::try_new(build_chunk_schema(dim), vec![
		string_column(chunks, |c| c.chunk_id.as_str()),
		string_column(chunks, |c| c.source_id.as_str()),
		string_column(chunks, |c| c.filing_type.as_str()),
		string_column(chunks, |c| c.period.as_str()),
		string_column(chunks, |c| c.section.as_str()),
		string_column(chunks, |c| c.text.as_str()),
		string_column(chunks, |c| c.parent_text.as_str()),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim as i32)),
	])?;
	Ok(record_batch)
}

fn string_column<'a>(chunks: &'a [Chunk], field: impl Fn(&'a Chunk) -> &'a str) -> Arc<dyn Array> {
	Arc::new(StringArray::from_iter_values(chunks.iter().map(field)))
}

fn str_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("{} column missing", name))
}

/// Decode a vector-search batch. Similarity is `1 - _distance` (cosine).
pub fn record_batch_to_neighbors(batch: &RecordBatch) -> Result<Vec<Neighbor>> {
	let ids = str_col(batch, "chunk_id")?;
	let sources = str_col(batch, "source_id")?;
	let filing_types = str_col(batch, "filing_type")?;
	let periods = str_col(batch, "period")?;
	let sections = str_col(batch, "section")?;
	let texts = str_col(batch, "text")?;
	let parents = str_col(batch, "parent_text")?;
	let vectors = batch.column_by_name(VECTOR_COLUMN).and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()).ok_or_else(|| anyhow!("vector column missing"))?;
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());

	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let embedding = if vectors.is_valid(i) { vectors.value(i).as_primitive::<arrow_array::types::Float32Type>().values().to_vec() } else { Vec::new() };
		let similarity = distances.map(|d| 1.0 - d.value(i)).unwrap_or(0.0);
		out.push(Neighbor {
			chunk: Chunk {
				chunk_id: ids.value(i).to_string(),
				text: texts.value(i).to_string(),
				embedding,
				source_id: sources.value(i).to_string(),
				filing_type: filing_types.value(i).to_string(),
				period: periods.value(i).to_string(),
				section: sections.value(i).to_string(),
				parent_text: parents.value(i).to_string(),
				trimmed: false,
			},
			similarity,
		});
	}
	Ok(out)
}
