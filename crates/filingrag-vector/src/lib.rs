//! Persistent chunk index on LanceDB, plus an in-memory index with the same
//! contract for tests and small corpora.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashSet;
use tracing::{debug, info};

use filingrag_core::traits::VectorIndex;
use filingrag_core::types::{Chunk, ChunkFilter, Neighbor};

pub mod memory;
pub mod schema;
pub mod table;
pub mod writer;

pub use memory::MemoryIndex;

use crate::schema::{build_chunk_schema, vector_dim};
use crate::table::{ensure_table, filter_predicate, open_db, quote};
use crate::writer::{chunks_to_record_batch, record_batch_to_neighbors};

pub struct LanceIndex { conn: Connection, table_name: String }

impl LanceIndex {
	/// Open `table_name` under `uri`, creating it with a `dim`-wide vector
	/// column when absent. An existing table keeps its own width; compare
	/// [`VectorIndex::stored_dim`] against the embedder before use.
	pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
		let conn = open_db(uri).await?;
		ensure_table(&conn, table_name, build_chunk_schema(dim)).await?;
		info!(uri, table = table_name, "chunk index opened");
		Ok(Self { conn, table_name: table_name.to_string() })
	}

	async fn table(&self) -> Result<Table> {
		Ok(self.conn.open_table(&self.table_name).execute().await?)
	}

	async fn table_dim(&self, table: &Table) -> Result<usize> {
		vector_dim(&table.schema().await?).ok_or_else(|| anyhow::anyhow!("table {} has no vector column", self.table_name))
	}
}

#[async_trait]
impl VectorIndex for LanceIndex {
	async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
		let mut seen = HashSet::new();
		let unique: Vec<Chunk> = chunks.iter().filter(|c| seen.insert(c.chunk_id.as_str())).cloned().collect();
		if unique.is_empty() { return Ok(0); }
		let table = self.table().await?;
		let batch = chunks_to_record_batch(&unique, self.table_dim(&table).await?)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		// chunk_id is unique: rows already present are left untouched
		let mut mi = table.merge_insert(&["chunk_id"]);
		mi.when_not_matched_insert_all();
		let res = mi.execute(reader).await?;
		let inserted = res.num_inserted_rows as usize;
		debug!(offered = chunks.len(), inserted, "chunks added");
		Ok(inserted)
	}

	async fn query_similar(&self, vector: &[f32], filter: &ChunkFilter, k: usize) -> Result<Vec<Neighbor>> {
		if k == 0 { return Ok(Vec::new()); }
		let table = self.table().await?;
		let mut query = table.vector_search(vector.to_vec())?.distance_type(DistanceType::Cosine).limit(k);
		if let Some(predicate) = filter_predicate(filter) { query = query.only_if(predicate); }
		let mut stream = query.execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			hits.extend(record_batch_to_neighbors(&batch)?.into_iter().filter(|n| filter.matches(&n.chunk)));
		}
		hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
		hits.truncate(k);
		Ok(hits)
	}

	async fn exists(&self, chunk_id: &str) -> Result<bool> {
		let table = self.table().await?;
		Ok(table.count_rows(Some(format!("chunk_id = {}", quote(chunk_id)))).await? > 0)
	}

	async fn count(&self, filter: &ChunkFilter) -> Result<usize> {
		let table = self.table().await?;
		Ok(table.count_rows(filter_predicate(filter)).await?)
	}

	async fn delete_by_source(&self, source_id: &str) -> Result<usize> {
		let table = self.table().await?;
		let predicate = format!("source_id = {}", quote(source_id));
		let n = table.count_rows(Some(predicate.clone())).await?;
		if n > 0 { table.delete(&predicate).await?; }
		info!(source_id, removed = n, "source deleted from index");
		Ok(n)
	}

	async fn stored_dim(&self) -> Result<Option<usize>> {
		let table = self.table().await?;
		Ok(vector_dim(&table.schema().await?))
	}
}
