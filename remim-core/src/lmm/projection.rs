//! REML projection P = V^-1 - V^-1 X (X'V^-1X)^-1 X'V^-1.
//!
//! Shared by the variance-component fit and the score test: both need
//! P explicitly to form traces tr(P K) cheaply.

use remim_linalg::{CholeskyDecomp, DenseMatrix, LinalgError};

#[derive(Debug, Clone)]
pub struct Projection {
    pub p: DenseMatrix,
    /// log |V|
    pub log_det_v: f64,
    /// log |X' V^-1 X|
    pub log_det_xtvx: f64,
    /// GLS fixed effects (X'V^-1X)^-1 X'V^-1 y
    pub beta: Vec<f64>,
}

impl Projection {
    pub fn new(v: &DenseMatrix, x: &DenseMatrix, y: &[f64]) -> Result<Self, LinalgError> {
        let chol_v = CholeskyDecomp::new(v)?;
        let v_inv = chol_v.inverse();
        let v_inv_x = v_inv.mat_mul(x);
        let xtvx = x.transpose().mat_mul(&v_inv_x);
        let chol_xtvx = CholeskyDecomp::new(&xtvx)?;

        // (X'V^-1X)^-1 (V^-1 X)', column by column
        let p_dim = x.ncols();
        let mut gls = DenseMatrix::zeros(p_dim, v.nrows());
        for i in 0..v.nrows() {
            let row: Vec<f64> = (0..p_dim).map(|j| v_inv_x.get(i, j)).collect();
            gls.set_col(i, &chol_xtvx.solve(&row));
        }

        let mut p = v_inv.clone();
        p.add_scaled(&v_inv_x.mat_mul(&gls), -1.0);

        let beta = gls.mat_vec(y);

        Ok(Self {
            p,
            log_det_v: chol_v.log_det(),
            log_det_xtvx: chol_xtvx.log_det(),
            beta,
        })
    }

    pub fn apply(&self, v: &[f64]) -> Vec<f64> {
        self.p.mat_vec(v)
    }
}

/// Whether a residual sum of squares is rounding noise relative to y'y.
pub(crate) fn negligible_residual(ss: f64, yy: f64) -> bool {
    !ss.is_finite() || ss <= f64::EPSILON * yy
}
