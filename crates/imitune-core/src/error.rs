use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("cannot read embeddings from {}: {message}", path.display())]
    EmbeddingSource { path: PathBuf, message: String },

    #[error("source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("shape mismatch: {embeddings} embeddings but {rows} metadata rows")]
    ShapeMismatch { embeddings: usize, rows: usize },

    #[error("record {id} has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("missing column: {column}")]
    MissingColumn { column: String },

    #[error("invalid record id: {0:?}")]
    InvalidId(String),

    #[error(
        "row order mismatch: metadata table has {actual_rows} rows with digest {actual}, \
         generation recorded {expected_rows} rows with digest {expected}"
    )]
    RowOrderMismatch {
        expected: String,
        expected_rows: usize,
        actual: String,
        actual_rows: usize,
    },

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, Error>;
