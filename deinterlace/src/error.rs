//! Batch-level error types.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for scanning and batch scheduling.
#[derive(Error, Debug)]
pub enum BatchError {
    /// The input path is missing or not a directory.
    #[error("Input path is not a directory: {0}")]
    InvalidInput(PathBuf),

    /// The scan found nothing to do.
    #[error("No movies found beneath {0}")]
    NoMovies(PathBuf),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for batch operations.
pub type Result<T> = std::result::Result<T, BatchError>;
