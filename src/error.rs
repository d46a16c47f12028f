//! Error types for the sampling pipeline.
//!
//! Every numeric stage returns [`Result`], whose error is a closed set of
//! variants. Each variant records the [`Stage`] that raised it so a failed run
//! reports both what went wrong and where.

use std::fmt;

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, FieldError>;

/// Pipeline stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Grid,
    Covariance,
    Cholesky,
    Projection,
    Sampling,
    Config,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Grid => "grid",
            Stage::Covariance => "covariance",
            Stage::Cholesky => "cholesky",
            Stage::Projection => "projection",
            Stage::Sampling => "sampling",
            Stage::Config => "config",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("[{stage}] invalid argument: {reason}")]
    InvalidArgument { stage: Stage, reason: String },

    #[error("[{stage}] dimension mismatch: {reason}")]
    DimensionMismatch { stage: Stage, reason: String },

    #[error("[{stage}] matrix is not positive definite: pivot {pivot} has value {value:e}")]
    NonPositiveDefinite {
        stage: Stage,
        pivot: usize,
        value: f64,
    },

    #[error("[{stage}] degenerate constraint: constrained variance is {variance:e}")]
    DegenerateConstraint { stage: Stage, variance: f64 },

    #[error("[{stage}] integration did not converge: {reason}")]
    IntegrationNonConvergence { stage: Stage, reason: String },
}

impl FieldError {
    pub fn invalid_argument(stage: Stage, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            stage,
            reason: reason.into(),
        }
    }

    pub fn dimension_mismatch(stage: Stage, reason: impl Into<String>) -> Self {
        Self::DimensionMismatch {
            stage,
            reason: reason.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            FieldError::InvalidArgument { stage, .. }
            | FieldError::DimensionMismatch { stage, .. }
            | FieldError::NonPositiveDefinite { stage, .. }
            | FieldError::DegenerateConstraint { stage, .. }
            | FieldError::IntegrationNonConvergence { stage, .. } => *stage,
        }
    }
}
