//! Media layer error types.

use thiserror::Error;

/// Error type for movie reading and writing.
#[derive(Error, Debug)]
pub enum MediaError {
    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] deinterlace_core::CoreError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed container data.
    #[error("Invalid container data: {0}")]
    InvalidData(String),

    /// No registered provider handles the file's container format.
    #[error("No provider for container extension '{extension}'")]
    UnsupportedContainer { extension: String },

    /// Track index out of range.
    #[error("Track {0} not found")]
    TrackNotFound(usize),

    /// Writer operation out of sequence.
    #[error("Writer state error: {0}")]
    WriterState(String),

    /// The writer was cancelled while a pipeline was appending.
    #[error("Writer cancelled")]
    WriterCancelled,
}

impl MediaError {
    /// Create an invalid data error.
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        MediaError::InvalidData(msg.into())
    }

    /// Create a writer state error.
    pub fn writer_state(msg: impl Into<String>) -> Self {
        MediaError::WriterState(msg.into())
    }
}

/// Result type alias for media operations.
pub type Result<T> = std::result::Result<T, MediaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MediaError::UnsupportedContainer {
            extension: "mov".into(),
        };
        assert!(err.to_string().contains("'mov'"));
    }
}
