//! Run one search against the configured index and print the entries as JSON.
//!
//! `cargo run -p filingrag-retrieval --example search -- 0000320193 "How do China tariffs affect margins?" [years]`
//!
//! Set `APP_MODELS__USE_FAKE=true` to try it without model weights.
use anyhow::{bail, Result};
use filingrag_core::config::Config;
use filingrag_core::logging::init_tracing;
use filingrag_retrieval::{RetrievalPipeline, SearchRequest};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let mut args = std::env::args().skip(1);
    let (Some(source_id), Some(query)) = (args.next(), args.next()) else {
        bail!("usage: search <source_id> <query> [years]");
    };
    let years = match args.next() {
        Some(y) => y.parse()?,
        None => filingrag_retrieval::pipeline::DEFAULT_YEARS,
    };

    let config = Config::load()?;
    let base = std::env::current_dir()?;
    let pipeline = RetrievalPipeline::from_config(&config, &base).await?;
    let result = pipeline.search(&SearchRequest::new(query, source_id).years(years)).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
