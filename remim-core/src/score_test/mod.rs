//! Score tests for an additional variance component.
//!
//! A `ScoreTest` prepares the null model for a baseline component list
//! once, then scores any number of candidate kinship matrices against
//! it. The last component of a full list is the candidate.

pub mod permutation;
pub mod variance_component;

use serde::{Deserialize, Serialize};

use remim_linalg::DenseMatrix;

use crate::error::{RemimError, Result};
use crate::lmm::KinshipList;
use crate::model::Response;

pub use variance_component::VarianceComponentScoreTest;

/// Score statistic and p-value for one candidate position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub statistic: f64,
    pub pvalue: f64,
}

/// A prepared null model that scores candidate components.
pub trait CandidateScorer: Send + Sync {
    /// Score the kinship matrix of global position `position`.
    fn score(&self, position: usize, candidate: &DenseMatrix) -> Result<ScoreResult>;
}

pub trait ScoreTest: Send + Sync {
    /// Fit the null model with `baseline` and variance ratios `tau`.
    fn null_model(
        &self,
        response: &Response,
        baseline: &KinshipList<'_>,
        tau: &[f64],
    ) -> Result<Box<dyn CandidateScorer>>;

    /// Test the last component of `kinship` given the preceding ones.
    fn test(&self, response: &Response, kinship: &KinshipList<'_>, tau: &[f64]) -> Result<ScoreResult> {
        let (baseline, candidate, matrix) = kinship.split_last().ok_or_else(|| {
            RemimError::InvalidData("kinship list has no candidate component".into())
        })?;
        let position = candidate.position().unwrap_or_default();
        self.null_model(response, &baseline, tau)?
            .score(position, matrix)
    }
}
