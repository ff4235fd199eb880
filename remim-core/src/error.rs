//! Error taxonomy for the REMIM engine.
//!
//! Per-position `Computation` errors are absorbed by the genome scanner,
//! `Fit` errors abort a single refinement step, and `NoCandidate` is
//! fatal for the trait that raised it.

use remim_linalg::LinalgError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemimError {
    /// A score test failed at one position.
    #[error("score test failed at position {position}: {reason}")]
    Computation { position: usize, reason: String },

    /// The variance-component fit failed numerically.
    #[error("variance component fit failed: {reason}")]
    Fit { reason: String },

    /// A scan was requested over an empty position set.
    #[error("no candidate positions to scan ({context})")]
    NoCandidate { context: String },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Linalg(#[from] LinalgError),
}

impl RemimError {
    pub(crate) fn fit(reason: impl Into<String>) -> Self {
        RemimError::Fit {
            reason: reason.into(),
        }
    }

    pub(crate) fn computation(position: usize, reason: impl Into<String>) -> Self {
        RemimError::Computation {
            position,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RemimError>;
