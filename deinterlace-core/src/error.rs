//! Error types shared across the deinterlace crates.

use thiserror::Error;

/// Core error type.
///
/// Core operations are almost entirely infallible; what can fail is
/// construction with unusable parameters, and that is the one error this
/// layer produces.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Invalid parameter provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl CoreError {
    /// Create an invalid parameter error.
    pub fn invalid_param(msg: impl Into<String>) -> Self {
        CoreError::InvalidParameter(msg.into())
    }
}

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_param("bad width");
        assert_eq!(err.to_string(), "Invalid parameter: bad width");
    }
}
