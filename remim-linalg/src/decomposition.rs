#![allow(clippy::needless_range_loop)]
//! Matrix decompositions and solvers.
//!
//! Cholesky factorization of the symmetric positive definite
//! covariance operators that appear in REMIM:
//! V = sigma_e * W^-1 + sum_j sigma_j * K_j and X' V^-1 X.

use crate::dense::DenseMatrix;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinalgError {
    #[error("Matrix is not positive definite (pivot {pivot} = {value:.3e})")]
    NotPositiveDefinite { pivot: usize, value: f64 },

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Result of a Cholesky decomposition.
#[derive(Debug, Clone)]
pub struct CholeskyDecomp {
    /// Lower triangular factor L such that A = L * L'.
    pub l: DenseMatrix,
}

impl CholeskyDecomp {
    /// Compute the Cholesky decomposition of a symmetric positive definite matrix.
    pub fn new(a: &DenseMatrix) -> Result<Self, LinalgError> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(LinalgError::DimensionMismatch {
                expected: n,
                got: a.ncols(),
            });
        }
        let mut l = DenseMatrix::zeros(n, n);

        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l.get(j, k) * l.get(j, k);
            }
            let diag = a.get(j, j) - sum;
            if diag <= 0.0 || !diag.is_finite() {
                return Err(LinalgError::NotPositiveDefinite {
                    pivot: j,
                    value: diag,
                });
            }
            let ljj = diag.sqrt();
            l.set(j, j, ljj);

            for i in (j + 1)..n {
                let mut sum = 0.0;
                for k in 0..j {
                    sum += l.get(i, k) * l.get(j, k);
                }
                l.set(i, j, (a.get(i, j) - sum) / ljj);
            }
        }

        Ok(CholeskyDecomp { l })
    }

    /// Dimension of the factored matrix.
    pub fn dim(&self) -> usize {
        self.l.nrows()
    }

    /// Solve L * L' * x = b.
    pub fn solve(&self, b: &[f64]) -> Vec<f64> {
        let n = self.dim();
        assert_eq!(b.len(), n);

        // Forward substitution: L * y = b
        let mut y = vec![0.0; n];
        for i in 0..n {
            let mut sum = 0.0;
            for j in 0..i {
                sum += self.l.get(i, j) * y[j];
            }
            y[i] = (b[i] - sum) / self.l.get(i, i);
        }

        // Backward substitution: L' * x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut sum = 0.0;
            for j in (i + 1)..n {
                sum += self.l.get(j, i) * x[j];
            }
            x[i] = (y[i] - sum) / self.l.get(i, i);
        }

        x
    }

    /// Compute the inverse of the original matrix A^{-1} = (L L')^{-1}.
    pub fn inverse(&self) -> DenseMatrix {
        let n = self.dim();
        let mut inv = DenseMatrix::zeros(n, n);
        let mut e = vec![0.0; n];
        for j in 0..n {
            e[j] = 1.0;
            let col = self.solve(&e);
            inv.set_col(j, &col);
            e[j] = 0.0;
        }
        inv
    }

    /// log |A| = 2 * sum(log L_ii).
    pub fn log_det(&self) -> f64 {
        2.0 * self.l.diag().iter().map(|d| d.ln()).sum::<f64>()
    }
}

/// Solve a symmetric positive definite system A*x = b using Cholesky.
pub fn solve_spd(a: &DenseMatrix, b: &[f64]) -> Result<Vec<f64>, LinalgError> {
    let chol = CholeskyDecomp::new(a)?;
    Ok(chol.solve(b))
}

/// Compute the inverse of a symmetric positive definite matrix.
pub fn inverse_spd(a: &DenseMatrix) -> Result<DenseMatrix, LinalgError> {
    let chol = CholeskyDecomp::new(a)?;
    Ok(chol.inverse())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cholesky() {
        // A = [[4, 2], [2, 3]]
        let a = DenseMatrix::from_row_major(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let chol = CholeskyDecomp::new(&a).unwrap();
        // L should be [[2, 0], [1, sqrt(2)]]
        assert!((chol.l.get(0, 0) - 2.0).abs() < 1e-10);
        assert!((chol.l.get(1, 0) - 1.0).abs() < 1e-10);
        assert!((chol.l.get(1, 1) - 2.0f64.sqrt()).abs() < 1e-10);
        // |A| = 8
        assert!((chol.log_det() - 8.0f64.ln()).abs() < 1e-10);
    }

    #[test]
    fn test_cholesky_solve() {
        let a = DenseMatrix::from_row_major(3, 3, &[4.0, 2.0, 1.0, 2.0, 5.0, 3.0, 1.0, 3.0, 6.0]);
        let b = vec![1.0, 2.0, 3.0];
        let x = solve_spd(&a, &b).unwrap();
        let ax = a.mat_vec(&x);
        for i in 0..3 {
            assert!((ax[i] - b[i]).abs() < 1e-10, "ax[{}]={} != b[{}]={}", i, ax[i], i, b[i]);
        }
    }

    #[test]
    fn test_cholesky_not_pd() {
        let a = DenseMatrix::from_row_major(2, 2, &[1.0, 3.0, 3.0, 1.0]);
        assert!(matches!(
            CholeskyDecomp::new(&a),
            Err(LinalgError::NotPositiveDefinite { pivot: 1, .. })
        ));
    }

    #[test]
    fn test_cholesky_rejects_non_square() {
        let a = DenseMatrix::zeros(2, 3);
        assert!(matches!(
            CholeskyDecomp::new(&a),
            Err(LinalgError::DimensionMismatch { expected: 2, got: 3 })
        ));
    }

    #[test]
    fn test_inverse_spd() {
        let a = DenseMatrix::from_row_major(2, 2, &[4.0, 2.0, 2.0, 3.0]);
        let inv = inverse_spd(&a).unwrap();
        let prod = a.mat_mul(&inv);
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!(
                    (prod.get(i, j) - expected).abs() < 1e-10,
                    "A*A^{{-1}}[{},{}] = {}, expected {}",
                    i,
                    j,
                    prod.get(i, j),
                    expected
                );
            }
        }
    }
}
