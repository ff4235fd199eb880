//! remim-linalg: Linear algebra wrappers for REMIM-RS
//!
//! Provides the dense matrix type used for kinship matrices and
//! covariance operators, plus the Cholesky-based solvers behind the
//! variance-component fit and the score test.

pub mod decomposition;
pub mod dense;

pub use decomposition::{CholeskyDecomp, LinalgError};
pub use dense::DenseMatrix;
