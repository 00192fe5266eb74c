//! Error types for field separation.

use thiserror::Error;

/// Error type for field separation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldsError {
    /// Frame dimensions unusable for field separation.
    ///
    /// Interlaced material always has an even line count of at least two;
    /// anything else cannot be split into two fields.
    #[error("Invalid frame dimensions: {width}x{height} (even height >= 2 required)")]
    InvalidDimensions { width: u32, height: u32 },

    /// Source frame geometry does not match the pool's buffer geometry.
    #[error("Frame geometry mismatch: pool produces {expected_width}x{expected_height}, frame is {actual_width}x{actual_height}")]
    GeometryMismatch {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
}

impl FieldsError {
    /// Create an invalid dimensions error.
    pub fn invalid_dimensions(width: u32, height: u32) -> Self {
        Self::InvalidDimensions { width, height }
    }

    /// Create a geometry mismatch error.
    pub fn geometry_mismatch(
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    ) -> Self {
        Self::GeometryMismatch {
            expected_width,
            expected_height,
            actual_width,
            actual_height,
        }
    }
}

/// Result type for field separation operations.
pub type Result<T> = std::result::Result<T, FieldsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FieldsError::invalid_dimensions(720, 1);
        assert!(err.to_string().contains("720x1"));

        let err = FieldsError::geometry_mismatch(720, 480, 640, 480);
        assert!(err.to_string().contains("720x480"));
        assert!(err.to_string().contains("640x480"));
    }
}
