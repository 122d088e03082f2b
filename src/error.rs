use std::path::PathBuf;

use thiserror::Error;

/// Errors raised anywhere in the regression workflow.
#[derive(Debug, Error)]
pub enum Error {
    #[error("could not open `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("column `{0}` not found")]
    MissingColumn(String),
    #[error("column `{column}` row {row}: cannot use `{value}` as a number")]
    NotNumeric {
        column: String,
        row: usize,
        value: String,
    },
    #[error("column `{0}` has zero or undefined spread and cannot be standardized")]
    ZeroVariance(String),
    #[error("column `{column}` cannot be recoded: {reason}")]
    InvalidLabels { column: String, reason: String },
    #[error("invalid prior: {0}")]
    InvalidPrior(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("dimension mismatch: {0}")]
    Dimension(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("sampler `{sampler}` cannot fit this model: {reason}")]
    UnsupportedSampler {
        sampler: &'static str,
        reason: String,
    },
    #[error("matrix is not positive definite")]
    NotPositiveDefinite,
    #[error("no data: {0}")]
    Empty(String),
}

pub type Result<T> = std::result::Result<T, Error>;
