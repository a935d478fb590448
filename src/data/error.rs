use std::path::PathBuf;

use thiserror::Error;

/// Everything the pipeline can fail with.
///
/// Errors surface synchronously to the caller; nothing is retried. A one-shot
/// file load has no transient-failure class, and queries on an already-loaded
/// dataset can only fail with [`PipelineError::InvalidRange`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("source file not found: {0}")]
    NotFound(PathBuf),

    #[error("required column '{column}' is missing from the source file")]
    SchemaError { column: String },

    #[error("invalid filter range: low {low} > high {high}")]
    InvalidRange { low: f64, high: f64 },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("row {row}, column '{column}': {message}")]
    Malformed {
        row: usize,
        column: String,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),
}

impl PipelineError {
    pub(crate) fn malformed(row: usize, column: &str, message: impl Into<String>) -> Self {
        PipelineError::Malformed {
            row,
            column: column.to_string(),
            message: message.into(),
        }
    }
}
