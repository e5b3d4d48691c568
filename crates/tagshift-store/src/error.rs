use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corpus file not found: {0}")]
    CorpusNotFound(PathBuf),

    #[error("unsupported corpus format: {0} (expected .parquet, .json, .jsonl or .ndjson)")]
    UnsupportedFormat(PathBuf),

    #[error("missing column {0:?}")]
    MissingColumn(String),

    #[error("corpus has no usable v1/v2 pairs")]
    EmptyCorpus,

    #[error("index was built with embedder {found:?}, but {expected:?} is configured")]
    ModelMismatch { expected: String, found: String },

    #[error("invalid index file: {0}")]
    InvalidIndex(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
