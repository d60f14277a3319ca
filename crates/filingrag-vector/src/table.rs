//! LanceDB connection helpers and the SQL predicates used for filtered reads.
use anyhow::Result;
use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;

use filingrag_core::types::ChunkFilter;

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
    let names = conn.table_names().execute().await?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    Ok(())
}

pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `None` for an empty filter, otherwise an `AND` of equality predicates.
pub fn filter_predicate(filter: &ChunkFilter) -> Option<String> {
    let clauses: Vec<String> = [("source_id", &filter.source_id), ("period", &filter.period), ("filing_type", &filter.filing_type)]
        .into_iter()
        .filter_map(|(col, v)| v.as_deref().map(|v| format!("{} = {}", col, quote(v))))
        .collect();
    if clauses.is_empty() { None } else { Some(clauses.join(" AND ")) }
}
