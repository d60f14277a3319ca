use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The index was built with a different embedding model than the one
    /// currently loaded. Raised once when the pipeline connects.
    #[error("Embedding dimension mismatch: index stores {index}, embedder produces {embedder}")]
    DimensionMismatch { index: usize, embedder: usize },

    #[error("Vector index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Non-fatal to a search: logged and the query runs on what is indexed.
    #[error("Ingestion failed: {0}")]
    Ingestion(String),
}

impl Error {
    /// Misconfiguration rather than a transient collaborator failure.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::DimensionMismatch { .. } | Error::InvalidConfig(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
