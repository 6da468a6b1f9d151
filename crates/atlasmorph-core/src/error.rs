//! Error types for deformation operations.
//!
//! Every failure in the forward path is fatal for the current pass: errors are
//! propagated to the caller and never recovered locally.

use thiserror::Error;

/// Main error type for atlas deformation operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DiffeoError {
    /// Invalid configuration detected at construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// NaN (or a degenerate normalization) detected during a forward pass.
    #[error("Numerical instability in {stage}: {message}")]
    NumericalInstability {
        stage: &'static str,
        message: String,
    },

    /// Rank or dimensionality mismatch.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Shape mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// Result type for deformation operations.
pub type Result<T> = std::result::Result<T, DiffeoError>;

impl DiffeoError {
    /// Create an invalid configuration error.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a numerical instability error for the given pipeline stage.
    pub fn numerical_instability(stage: &'static str, msg: impl Into<String>) -> Self {
        Self::NumericalInstability {
            stage,
            message: msg.into(),
        }
    }

    /// Create a dimension mismatch error.
    pub fn dimension_mismatch(msg: impl Into<String>) -> Self {
        Self::DimensionMismatch(msg.into())
    }

    /// Create a shape mismatch error.
    pub fn shape_mismatch(expected: &[usize], actual: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }

    /// True for errors raised by a NaN check or a degenerate normalization.
    pub fn is_numerical_instability(&self) -> bool {
        matches!(self, Self::NumericalInstability { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = DiffeoError::invalid_configuration("bad factor");
        assert!(matches!(err, DiffeoError::InvalidConfiguration(_)));
        assert!(!err.is_numerical_instability());
    }

    #[test]
    fn test_error_display() {
        let err = DiffeoError::numerical_instability("integration", "NaN at step 3");
        assert_eq!(
            err.to_string(),
            "Numerical instability in integration: NaN at step 3"
        );
        assert!(err.is_numerical_instability());
    }

    #[test]
    fn test_shape_mismatch() {
        let err = DiffeoError::shape_mismatch(&[2, 4], &[2, 3]);
        let err_str = err.to_string();
        assert!(err_str.contains("expected [2, 4]"));
        assert!(err_str.contains("got [2, 3]"));
    }
}
