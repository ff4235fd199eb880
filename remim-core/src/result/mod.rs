//! Output types for a REMIM run.

pub mod assemble;
pub mod model_fit;
pub mod table;

use serde::{Deserialize, Serialize};

use crate::config::RemimConfig;
use crate::model::QtlData;
use crate::search::Thresholds;

pub use assemble::assemble;
pub use model_fit::{fit_qtl_model, QtlModelFit, QtlVariance};
pub use table::{format_pvalue, QtlRecord, QtlTable};

/// Search outcome for one phenotype column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitResult {
    pub pheno_col: String,
    /// Genome-wide statistics; `None` where the last scan gave no result.
    pub statistic: Vec<Option<f64>>,
    pub pvalue: Vec<Option<f64>>,
    pub qtls: QtlTable,
    /// Support-interval bounds, row-aligned with `qtls`.
    pub lower: Option<QtlTable>,
    pub upper: Option<QtlTable>,
    pub thresholds: Thresholds,
    pub rounds: usize,
    #[serde(default)]
    pub model_fit: Option<QtlModelFit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub w_size: f64,
    pub sig_fwd: f64,
    pub sig_bwd: f64,
    pub polygenes: bool,
    pub d_sint: Option<f64>,
    pub n_rounds: Option<usize>,
    pub ploidy: u8,
    pub step: Option<f64>,
}

impl RunMetadata {
    pub fn new(config: &RemimConfig, data: &QtlData) -> Self {
        Self {
            w_size: config.w_size,
            sig_fwd: config.sig_fwd,
            sig_bwd: config.sig_bwd,
            polygenes: config.polygenes,
            d_sint: config.d_sint,
            n_rounds: config.n_rounds,
            ploidy: data.ploidy,
            step: data.genome.step(),
        }
    }
}

/// A trait whose search aborted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitFailure {
    pub pheno_col: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemimOutput {
    pub metadata: RunMetadata,
    pub traits: Vec<TraitResult>,
    pub failures: Vec<TraitFailure>,
}

impl RemimOutput {
    pub fn get(&self, pheno_col: &str) -> Option<&TraitResult> {
        self.traits.iter().find(|t| t.pheno_col == pheno_col)
    }
}
