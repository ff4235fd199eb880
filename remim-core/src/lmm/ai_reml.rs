//! Average Information REML (AI-REML) for multiple variance components.
//!
//! Estimates theta = [sigma2_e, sigma2_1, ..., sigma2_m] for
//!   V = sigma2_e * W^-1 + sum_j sigma2_j * K_j
//! by iterating theta_new = theta_old + AI^-1 * score, with one EM-style
//! step from the starting values before switching to AI updates.

use serde::{Deserialize, Serialize};
use tracing::debug;

use remim_linalg::{CholeskyDecomp, DenseMatrix};

use super::kinship_list::KinshipList;
use super::projection::{negligible_residual, Projection};
use crate::error::{RemimError, Result};
use crate::model::Response;

/// Estimates variance components for a response and component list.
pub trait VarianceComponentFit: Send + Sync {
    fn fit(&self, response: &Response, kinship: &KinshipList<'_>) -> Result<VcFit>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitStatus {
    Converged,
    NotConverged,
}

/// Result of a variance-component fit.
#[derive(Debug, Clone)]
pub struct VcFit {
    /// Variance ratios sigma2_j / sigma2_e, one per component.
    pub tau: Vec<f64>,
    pub sigma2_e: f64,
    pub sigma2: Vec<f64>,
    /// GLS fixed effects at the final estimates.
    pub beta: Vec<f64>,
    /// REML log-likelihood (up to a constant).
    pub log_likelihood: f64,
    pub iterations: usize,
    pub status: FitStatus,
}

impl VcFit {
    pub fn is_converged(&self) -> bool {
        self.status == FitStatus::Converged
    }
}

/// Configuration for AI-REML iterations.
#[derive(Debug, Clone)]
pub struct AiRemlConfig {
    /// Maximum outer iterations.
    pub max_iter: usize,
    /// Convergence tolerance on the relative change of theta.
    pub tol: f64,
    /// Floor applied to every variance after each update.
    pub min_variance: f64,
    /// Number of EM-style steps before AI updates.
    pub em_steps: usize,
}

impl Default for AiRemlConfig {
    fn default() -> Self {
        Self {
            max_iter: 50,
            tol: 1e-4,
            min_variance: 1e-10,
            em_steps: 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AiReml {
    pub config: AiRemlConfig,
}

impl AiReml {
    pub fn new(config: AiRemlConfig) -> Self {
        Self { config }
    }
}

fn projection(v: &DenseMatrix, response: &Response) -> Result<Projection> {
    Projection::new(v, &response.x, &response.y).map_err(|e| RemimError::fit(e.to_string()))
}

fn reml_log_likelihood(proj: &Projection, y: &[f64], py: &[f64]) -> f64 {
    -0.5 * (proj.log_det_v + proj.log_det_xtvx + DenseMatrix::dot(y, py))
}

impl VarianceComponentFit for AiReml {
    fn fit(&self, response: &Response, kinship: &KinshipList<'_>) -> Result<VcFit> {
        let n = response.n();
        let p = response.p();
        let m = kinship.len();
        if n <= p {
            return Err(RemimError::fit(format!(
                "{} observations for {} fixed effects",
                n, p
            )));
        }
        let y = &response.y;
        let r = response.residual_diag();

        if m == 0 {
            return fit_residual_only(response, &r);
        }

        // Start from an even split of the phenotypic variance
        let mean = y.iter().sum::<f64>() / n as f64;
        let ss = y.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
        if negligible_residual(ss, DenseMatrix::dot(y, y)) {
            return Err(RemimError::fit("phenotype has no variance"));
        }
        let var_y = ss / (n - 1) as f64;
        let mut theta = vec![var_y / (m + 1) as f64; m + 1];

        let mut status = FitStatus::NotConverged;
        let mut iterations = 0;

        for iter in 0..self.config.max_iter {
            iterations = iter + 1;
            let v = kinship.covariance(&r, theta[0], &theta[1..]);
            let proj = projection(&v, response)?;
            let py = proj.apply(y);

            // dV_k P y, with dV_0 = W^-1
            let mut u: Vec<Vec<f64>> = Vec::with_capacity(m + 1);
            u.push(py.iter().zip(r.iter()).map(|(a, b)| a * b).collect());
            let mut traces = Vec::with_capacity(m + 1);
            traces.push((0..n).map(|i| proj.p.get(i, i) * r[i]).sum::<f64>());
            for (_, k) in kinship.iter() {
                u.push(k.mat_vec(&py));
                traces.push(proj.p.trace_of_product(k));
            }

            let score: Vec<f64> = u
                .iter()
                .zip(traces.iter())
                .map(|(uk, tr)| -0.5 * (tr - DenseMatrix::dot(&py, uk)))
                .collect();
            if score.iter().any(|s| !s.is_finite()) {
                return Err(RemimError::fit(format!(
                    "non-finite REML score at iteration {}",
                    iter
                )));
            }

            let delta = if iter < self.config.em_steps {
                theta
                    .iter()
                    .zip(score.iter())
                    .map(|(t, s)| 2.0 * t * t * s / n as f64)
                    .collect::<Vec<f64>>()
            } else {
                let pu: Vec<Vec<f64>> = u.iter().map(|uk| proj.apply(uk)).collect();
                let ai = DenseMatrix::from_fn(m + 1, m + 1, |k, l| {
                    0.5 * DenseMatrix::dot(&u[k], &pu[l])
                });
                let chol = CholeskyDecomp::new(&ai).map_err(|_| {
                    RemimError::fit(format!(
                        "average information matrix is singular at iteration {}",
                        iter
                    ))
                })?;
                chol.solve(&score)
            };

            // Step halving: keep every component non-negative
            let mut step = 1.0;
            let mut next: Vec<f64> = theta
                .iter()
                .zip(delta.iter())
                .map(|(t, d)| t + step * d)
                .collect();
            while next.iter().any(|t| *t < 0.0) && step > 1e-10 {
                step *= 0.5;
                next = theta
                    .iter()
                    .zip(delta.iter())
                    .map(|(t, d)| t + step * d)
                    .collect();
            }
            for t in next.iter_mut() {
                *t = t.max(self.config.min_variance);
            }

            let max_change = next
                .iter()
                .zip(theta.iter())
                .map(|(a, b)| (a - b).abs() / (a.abs() + b.abs() + self.config.tol))
                .fold(0.0, f64::max);

            debug!(
                "AI-REML iter {}: theta={:?}, loglik={:.4}, change={:.2e}",
                iter,
                next,
                reml_log_likelihood(&proj, y, &py),
                max_change
            );

            theta = next;
            if max_change < self.config.tol {
                status = FitStatus::Converged;
                break;
            }
        }

        if status == FitStatus::NotConverged {
            debug!(
                "AI-REML did not converge after {} iterations",
                self.config.max_iter
            );
        }

        let v = kinship.covariance(&r, theta[0], &theta[1..]);
        let proj = projection(&v, response)?;
        let py = proj.apply(y);
        let log_likelihood = reml_log_likelihood(&proj, y, &py);
        if !log_likelihood.is_finite() {
            return Err(RemimError::fit("non-finite log-likelihood"));
        }

        let sigma2_e = theta[0];
        let sigma2 = theta[1..].to_vec();
        Ok(VcFit {
            tau: sigma2.iter().map(|s| s / sigma2_e).collect(),
            sigma2_e,
            sigma2,
            beta: proj.beta,
            log_likelihood,
            iterations,
            status,
        })
    }
}

/// V = sigma2_e W^-1 has the closed-form REML estimate y'P_W y / (n - p).
fn fit_residual_only(response: &Response, r: &[f64]) -> Result<VcFit> {
    let n = response.n() as f64;
    let p = response.p() as f64;
    let proj = projection(&DenseMatrix::from_diag(r), response)?;
    let py = proj.apply(&response.y);
    let ypy = DenseMatrix::dot(&response.y, &py);
    if negligible_residual(ypy, DenseMatrix::dot(&response.y, &response.y)) {
        return Err(RemimError::fit("phenotype has no residual variance"));
    }
    let sigma2_e = ypy / (n - p);
    let log_likelihood =
        -0.5 * (proj.log_det_v + n * sigma2_e.ln() + proj.log_det_xtvx - p * sigma2_e.ln() + (n - p));
    Ok(VcFit {
        tau: Vec::new(),
        sigma2_e,
        sigma2: Vec::new(),
        beta: proj.beta,
        log_likelihood,
        iterations: 0,
        status: FitStatus::Converged,
    })
}
