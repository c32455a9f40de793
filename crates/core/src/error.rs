//! Error types for Rillflow

use thiserror::Error;

/// Main error type for Rillflow operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid array dimensions: {rows}x{cols}")]
    InvalidDimensions { rows: usize, cols: usize },

    #[error("Index out of bounds: ({row}, {col}) in array of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Array size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch {
        er: usize,
        ec: usize,
        ar: usize,
        ac: usize,
    },

    #[error("Partitioning mismatch: {0}")]
    PartitioningMismatch(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Rillflow operations
pub type Result<T> = std::result::Result<T, Error>;
