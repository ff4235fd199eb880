//! Forward and backward significance thresholds.
//!
//! Absolute levels come straight from the configuration. With a null
//! distribution of per-permutation minimum p-values, the configured
//! levels are read as quantiles of that distribution instead.

use serde::{Deserialize, Serialize};

use crate::config::RemimConfig;
use crate::error::{RemimError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub forward: f64,
    pub backward: f64,
}

impl Thresholds {
    pub fn from_config(config: &RemimConfig) -> Self {
        Self {
            forward: config.sig_fwd,
            backward: config.sig_bwd,
        }
    }

    /// Empirical quantiles of the null minimum p-values.
    pub fn from_null(config: &RemimConfig, min_pvalues: &[f64]) -> Result<Self> {
        let mut sorted: Vec<f64> = min_pvalues.iter().copied().filter(|p| p.is_finite()).collect();
        if sorted.is_empty() {
            return Err(RemimError::InvalidData(
                "null distribution has no finite minimum p-values".into(),
            ));
        }
        sorted.sort_by(f64::total_cmp);
        Ok(Self {
            forward: quantile(&sorted, config.sig_fwd),
            backward: quantile(&sorted, config.sig_bwd),
        })
    }
}

/// Type-7 (linear interpolation) quantile of sorted, non-empty data.
pub fn quantile(sorted: &[f64], prob: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let h = (n - 1) as f64 * prob.clamp(0.0, 1.0);
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}
