//! Search configuration.
//!
//! Mirrors the option surface of the REMIM procedure: exclusion window,
//! forward/backward significance, support-interval drop, polygenic
//! background mode, round cap and worker-pool size.

use serde::{Deserialize, Serialize};

use crate::error::{RemimError, Result};

/// Options for one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemimConfig {
    /// Exclusion window on each side of an accepted QTL, in cM.
    pub w_size: f64,
    /// Forward-search significance level (or quantile of the null
    /// minimum p-value distribution when one is supplied).
    pub sig_fwd: f64,
    /// Backward-elimination significance level (or quantile).
    pub sig_bwd: f64,
    /// Support-interval drop in -log10(p); `None` disables intervals.
    pub d_sint: Option<f64>,
    /// Use one averaged background component instead of one per QTL.
    pub polygenes: bool,
    /// Round cap; `None` means unbounded.
    pub n_rounds: Option<usize>,
    /// Worker-pool size; `None` uses the rayon default.
    pub n_clusters: Option<usize>,
}

impl Default for RemimConfig {
    fn default() -> Self {
        Self {
            w_size: 15.0,
            sig_fwd: 0.01,
            sig_bwd: 0.0001,
            d_sint: Some(1.5),
            polygenes: false,
            n_rounds: None,
            n_clusters: None,
        }
    }
}

impl RemimConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.w_size.is_finite() || self.w_size < 0.0 {
            return Err(RemimError::InvalidConfig(format!(
                "w_size must be a non-negative number of cM, got {}",
                self.w_size
            )));
        }
        for (name, sig) in [("sig_fwd", self.sig_fwd), ("sig_bwd", self.sig_bwd)] {
            if !(sig > 0.0 && sig <= 1.0) {
                return Err(RemimError::InvalidConfig(format!(
                    "{} must lie in (0, 1], got {}",
                    name, sig
                )));
            }
        }
        if let Some(d) = self.d_sint {
            if !d.is_finite() || d <= 0.0 {
                return Err(RemimError::InvalidConfig(format!(
                    "d_sint must be positive, got {}",
                    d
                )));
            }
        }
        if self.n_rounds == Some(0) {
            return Err(RemimError::InvalidConfig("n_rounds must be at least 1".into()));
        }
        if self.n_clusters == Some(0) {
            return Err(RemimError::InvalidConfig("n_clusters must be at least 1".into()));
        }
        Ok(())
    }

    /// Whether `round` has reached the round cap.
    pub fn round_cap_reached(&self, round: usize) -> bool {
        self.n_rounds.is_some_and(|cap| round >= cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = RemimConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.w_size, 15.0);
        assert!(!config.round_cap_reached(1_000_000));
    }

    #[test]
    fn test_rejects_bad_values() {
        let bad = [
            RemimConfig { w_size: -1.0, ..Default::default() },
            RemimConfig { sig_fwd: 0.0, ..Default::default() },
            RemimConfig { sig_bwd: 1.5, ..Default::default() },
            RemimConfig { sig_fwd: f64::NAN, ..Default::default() },
            RemimConfig { d_sint: Some(0.0), ..Default::default() },
            RemimConfig { n_rounds: Some(0), ..Default::default() },
            RemimConfig { n_clusters: Some(0), ..Default::default() },
        ];
        for config in bad {
            assert!(
                matches!(config.validate(), Err(RemimError::InvalidConfig(_))),
                "accepted {:?}",
                config
            );
        }
    }

    #[test]
    fn test_round_cap() {
        let config = RemimConfig { n_rounds: Some(2), ..Default::default() };
        assert!(!config.round_cap_reached(1));
        assert!(config.round_cap_reached(2));
    }
}
