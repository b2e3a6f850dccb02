//! Error types for tnseq_zinb

use thiserror::Error;

/// Fatal errors that abort a run before any output is written.
///
/// Per-gene problems (too few sites, no counts, model failures) are not
/// errors; they end up in the status column of the result table.
#[derive(Error, Debug)]
pub enum ZinbError {
    #[error("Invalid combined wig: {reason}")]
    InvalidCombinedWig { reason: String },

    #[error("Invalid annotation: {reason}")]
    InvalidAnnotation { reason: String },

    #[error("Invalid metadata: {reason}")]
    InvalidMetadata { reason: String },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: String, got: String },

    #[error("Empty data: {reason}")]
    EmptyData { reason: String },

    #[error("Normalization failed: {reason}")]
    NormalizationFailed { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ZinbError>;
