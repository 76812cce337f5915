//! Error type for FPLS fitting and projection.

use crate::fdata::BlockKind;
use thiserror::Error;

/// Errors raised by block construction, fitting and projection.
///
/// All errors are reported synchronously by the call that detects them.
/// Power-method non-convergence is deliberately absent: the solver returns
/// its last iterate after `max_iter` steps.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FplsError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Blocks must have the same number of samples, but X has {x_samples} and Y has {y_samples}.")]
    SampleCountMismatch { x_samples: usize, y_samples: usize },

    #[error("Dimension mismatch in {what}: expected {expected}, found {found}.")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Unsupported data type: expected {expected} data, found {found}.")]
    UnsupportedDataType { expected: BlockKind, found: BlockKind },

    #[error("This FPLS instance is not fitted yet. Call `fit` before using this method.")]
    NotFitted,

    #[error("Penalty matrix of block {block} is not positive definite; add regularization or reduce the number of components.")]
    NotPositiveDefinite { block: String },

    #[error("Numerical failure: {0}")]
    Numerical(String),
}

impl FplsError {
    /// Whether the error belongs to the configuration category
    /// (bad parameters, mismatched shapes or sample counts).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            FplsError::Configuration(_)
                | FplsError::SampleCountMismatch { .. }
                | FplsError::DimensionMismatch { .. }
        )
    }

    /// Whether the error comes from a failed factorization or decomposition.
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            FplsError::NotPositiveDefinite { .. } | FplsError::Numerical(_)
        )
    }
}
