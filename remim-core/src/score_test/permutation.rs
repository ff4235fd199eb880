//! Permutation null distribution of the genome-wide minimum p-value.
//!
//! Shuffling the phenotype (and its weights) against fixed kinship
//! breaks every genotype-phenotype link; the smallest p-value of a
//! null-baseline scan per shuffle gives an empirical threshold that
//! accounts for the number of positions tested.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ScoreTest;
use crate::error::{RemimError, Result};
use crate::lmm::KinshipList;
use crate::model::{KinshipTensor, QtlData, Response};
use crate::search::scan;

/// Per-trait minimum p-values from permuted data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NullDistribution {
    pub n_perm: usize,
    pub seed: u64,
    pub min_pvalues: BTreeMap<String, Vec<f64>>,
}

impl NullDistribution {
    pub fn new(n_perm: usize, seed: u64) -> Self {
        Self {
            n_perm,
            seed,
            min_pvalues: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, pheno_col: impl Into<String>, min_pvalues: Vec<f64>) {
        self.min_pvalues.insert(pheno_col.into(), min_pvalues);
    }

    pub fn get(&self, pheno_col: &str) -> Option<&[f64]> {
        self.min_pvalues.get(pheno_col).map(|v| v.as_slice())
    }
}

/// Minimum p-value of a null-baseline scan for each of `n_perm`
/// shuffles of `response`.
///
/// `kinship` must already be restricted to the individuals of
/// `response`. Permutations whose scan yields no result are skipped.
pub fn permutation_min_pvalues<S: ScoreTest + ?Sized>(
    test: &S,
    response: &Response,
    kinship: &KinshipTensor,
    n_perm: usize,
    seed: u64,
) -> Result<Vec<f64>> {
    let n = response.n();
    let positions: Vec<usize> = (0..kinship.n_positions()).collect();
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(seed);
    let mut indices: Vec<usize> = (0..n).collect();
    let mut min_pvalues = Vec::with_capacity(n_perm);

    for perm in 0..n_perm {
        indices.shuffle(&mut rng);
        let shuffled = response.permuted(&indices);
        let update = scan(test, &shuffled, &KinshipList::empty(), &[], kinship, &positions)?;
        match update.values().map(|r| r.pvalue).min_by(f64::total_cmp) {
            Some(min_p) => min_pvalues.push(min_p),
            None => debug!("Permutation {} produced no scores", perm),
        }
    }
    Ok(min_pvalues)
}

/// Null distribution for the selected traits of a data object.
pub fn build_null_distribution<S: ScoreTest + ?Sized>(
    test: &S,
    data: &QtlData,
    pheno_cols: Option<&[String]>,
    n_perm: usize,
    seed: u64,
) -> Result<NullDistribution> {
    if n_perm == 0 {
        return Err(RemimError::InvalidConfig("n_perm must be at least 1".into()));
    }
    let mut null = NullDistribution::new(n_perm, seed);
    for col in data.trait_columns(pheno_cols)? {
        let name = &data.phenotypes.trait_names[col];
        let response = data.phenotypes.response(col)?;
        let kinship = data.kinship.subset(&response.individuals)?;
        info!("Trait {}: {} permutations", name, n_perm);
        let min_p = permutation_min_pvalues(test, &response, &kinship, n_perm, seed)?;
        null.insert(name.clone(), min_p);
    }
    Ok(null)
}
