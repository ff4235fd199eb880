//! Score test for one extra variance component.
//!
//! Null model: y ~ N(X b, s2 * V0), V0 = W^-1 + sum_j tau_j K_j.
//! With P0 the REML projection of V0 and s2 = y'P0y / (n - p):
//!   Q = y'P0 K P0 y / s2
//!   S = 0.5 * (Q - tr(P0 K))
//! Q is referred to a scaled chi-square a * chi2(df) matching its null
//! mean tr(P0 K) and variance 2 tr(P0 K P0 K).

use statrs::distribution::{ChiSquared, ContinuousCDF};

use remim_linalg::DenseMatrix;

use super::{CandidateScorer, ScoreResult, ScoreTest};
use crate::error::{RemimError, Result};
use crate::lmm::projection::negligible_residual;
use crate::lmm::{KinshipList, Projection};
use crate::model::Response;

#[derive(Debug, Clone, Copy, Default)]
pub struct VarianceComponentScoreTest;

impl ScoreTest for VarianceComponentScoreTest {
    fn null_model(
        &self,
        response: &Response,
        baseline: &KinshipList<'_>,
        tau: &[f64],
    ) -> Result<Box<dyn CandidateScorer>> {
        if tau.len() != baseline.len() {
            return Err(RemimError::fit(format!(
                "{} variance ratios for {} baseline components",
                tau.len(),
                baseline.len()
            )));
        }
        let n = response.n();
        let p = response.p();
        let v0 = baseline.covariance(&response.residual_diag(), 1.0, tau);
        let proj = Projection::new(&v0, &response.x, &response.y)
            .map_err(|e| RemimError::fit(format!("null model: {}", e)))?;
        let py = proj.apply(&response.y);
        let ypy = DenseMatrix::dot(&response.y, &py);
        if negligible_residual(ypy, DenseMatrix::dot(&response.y, &response.y)) {
            return Err(RemimError::fit(format!(
                "null model has degenerate residual sum of squares {:.3e}",
                ypy
            )));
        }
        let s2 = ypy / (n - p) as f64;
        Ok(Box::new(NullScorer { p0: proj.p, py, s2 }))
    }
}

struct NullScorer {
    p0: DenseMatrix,
    py: Vec<f64>,
    s2: f64,
}

impl CandidateScorer for NullScorer {
    fn score(&self, position: usize, candidate: &DenseMatrix) -> Result<ScoreResult> {
        if candidate.nrows() != self.py.len() || candidate.ncols() != self.py.len() {
            return Err(RemimError::computation(
                position,
                format!(
                    "candidate is {}x{}, expected {}",
                    candidate.nrows(),
                    candidate.ncols(),
                    self.py.len()
                ),
            ));
        }
        let q = candidate.quad_form(&self.py, &self.py) / self.s2;

        let p0k = self.p0.mat_mul(candidate);
        let mean = p0k.trace();
        let var = 2.0 * p0k.trace_of_product(&p0k);
        if !(mean.is_finite() && var.is_finite() && q.is_finite()) {
            return Err(RemimError::computation(position, "non-finite score moments"));
        }
        if mean <= 0.0 || var <= 0.0 {
            return Err(RemimError::computation(
                position,
                format!("degenerate null moments (mean {:.3e}, variance {:.3e})", mean, var),
            ));
        }

        let scale = var / (2.0 * mean);
        let df = 2.0 * mean * mean / var;
        let chi2 = ChiSquared::new(df)
            .map_err(|e| RemimError::computation(position, e.to_string()))?;
        let pvalue = chi2.sf(q.max(0.0) / scale).clamp(0.0, 1.0);

        Ok(ScoreResult {
            statistic: 0.5 * (q - mean),
            pvalue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two families of four with a strong family effect.
    fn family_data() -> (Response, DenseMatrix, DenseMatrix) {
        let y = vec![5.1, 4.8, 5.3, 4.9, -5.0, -4.7, -5.2, -4.9];
        let response = Response::new(y, None, (0..8).collect()).unwrap();
        let family = DenseMatrix::from_fn(8, 8, |i, j| if i / 4 == j / 4 { 1.0 } else { 0.0 });
        let unrelated = DenseMatrix::from_fn(8, 8, |i, j| {
            if i == j {
                1.0
            } else if i % 2 == j % 2 {
                0.25
            } else {
                0.0
            }
        });
        (response, family, unrelated)
    }

    #[test]
    fn test_detects_family_component() {
        let (response, family, unrelated) = family_data();
        let test = VarianceComponentScoreTest;
        let scorer = test
            .null_model(&response, &KinshipList::empty(), &[])
            .unwrap();

        let hit = scorer.score(0, &family).unwrap();
        let miss = scorer.score(1, &unrelated).unwrap();
        assert!(hit.statistic.is_finite() && miss.statistic.is_finite());
        assert!(hit.statistic > miss.statistic);
        assert!(hit.pvalue < miss.pvalue);
        assert!(hit.pvalue < 0.05, "p = {}", hit.pvalue);
        assert!((0.0..=1.0).contains(&miss.pvalue));
    }

    #[test]
    fn test_provided_test_matches_scorer() {
        let (response, family, _) = family_data();
        let test = VarianceComponentScoreTest;
        let list = KinshipList::builder().candidate(3, &family).build();
        let direct = test.test(&response, &list, &[]).unwrap();
        let scored = test
            .null_model(&response, &KinshipList::empty(), &[])
            .unwrap()
            .score(3, &family)
            .unwrap();
        assert_eq!(direct, scored);
    }

    #[test]
    fn test_identity_candidate_has_zero_statistic() {
        // With V0 = I, y'P0P0y / s2 equals tr(P0) = n - p exactly
        let (response, _, _) = family_data();
        let r = VarianceComponentScoreTest
            .null_model(&response, &KinshipList::empty(), &[])
            .unwrap()
            .score(0, &DenseMatrix::identity(8))
            .unwrap();
        assert!(r.statistic.abs() < 1e-8);
    }

    #[test]
    fn test_zero_candidate_is_computation_error() {
        let (response, _, _) = family_data();
        let scorer = VarianceComponentScoreTest
            .null_model(&response, &KinshipList::empty(), &[])
            .unwrap();
        let err = scorer.score(7, &DenseMatrix::zeros(8, 8)).unwrap_err();
        assert!(matches!(err, RemimError::Computation { position: 7, .. }));
    }

    #[test]
    fn test_tau_length_mismatch() {
        let (response, family, _) = family_data();
        let baseline = KinshipList::builder().qtl(0, &family).build();
        assert!(VarianceComponentScoreTest
            .null_model(&response, &baseline, &[])
            .is_err());
    }

    #[test]
    fn test_empty_list_is_rejected() {
        let (response, _, _) = family_data();
        assert!(VarianceComponentScoreTest
            .test(&response, &KinshipList::empty(), &[])
            .is_err());
    }

    #[test]
    fn test_constant_phenotype_null_is_fit_error() {
        let response = Response::new(vec![0.1; 8], None, (0..8).collect()).unwrap();
        let result = VarianceComponentScoreTest.null_model(&response, &KinshipList::empty(), &[]);
        assert!(matches!(result, Err(RemimError::Fit { .. })));
    }
}
