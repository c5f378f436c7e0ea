//! Error types for geometry primitives.

use thiserror::Error;

/// Errors raised while building fibers, bundles and subject sets.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// A fiber needs at least two points to have a length or be resampled.
    #[error("Degenerate fiber: {0}")]
    DegenerateFiber(String),

    /// Groupwise registration needs at least two subjects.
    #[error("Subject set needs at least 2 subjects, got {0}")]
    TooFewSubjects(usize),

    /// Subject ids and bundles were given with different lengths.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A parameter vector had the wrong number of entries.
    #[error("Invalid parameter vector: expected {expected} values, got {actual}")]
    InvalidParameters { expected: usize, actual: usize },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a degenerate fiber error.
    pub fn degenerate_fiber(msg: impl Into<String>) -> Self {
        Self::DegenerateFiber(msg.into())
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::TooFewSubjects(1);
        assert_eq!(err.to_string(), "Subject set needs at least 2 subjects, got 1");
    }

    #[test]
    fn test_invalid_parameters_display() {
        let err = CoreError::InvalidParameters { expected: 15, actual: 12 };
        let msg = err.to_string();
        assert!(msg.contains("15"));
        assert!(msg.contains("12"));
    }
}
