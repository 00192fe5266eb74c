//! Pipeline error types.

use thiserror::Error;

/// Pipeline error type.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Core error.
    #[error("Core error: {0}")]
    Core(#[from] deinterlace_core::CoreError),

    /// Media layer error.
    #[error("Media error: {0}")]
    Media(#[from] deinterlace_media::MediaError),

    /// Field separation error.
    #[error("Field separation error: {0}")]
    Fields(#[from] deinterlace_fields::FieldsError),

    /// The movie has no tracks.
    #[error("Movie has no tracks")]
    NoTracks,

    /// A track cannot be piped as classified.
    #[error("Invalid track {index}: {message}")]
    InvalidTrack { index: usize, message: String },

    /// The pump observed a cancellation request.
    #[error("Pipeline cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Create an invalid track error.
    pub fn invalid_track(index: usize, message: impl Into<String>) -> Self {
        PipelineError::InvalidTrack {
            index,
            message: message.into(),
        }
    }
}

/// Pipeline result type.
pub type Result<T> = std::result::Result<T, PipelineError>;
