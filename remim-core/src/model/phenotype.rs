//! Phenotype matrix and the per-trait response handed to the models.

use serde::{Deserialize, Serialize};

use remim_linalg::DenseMatrix;

use crate::error::{RemimError, Result};

/// Individuals x traits phenotype values; `None` marks a missing value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhenotypeMatrix {
    pub trait_names: Vec<String>,
    /// One column per trait, each of length `n_individuals`.
    pub values: Vec<Vec<Option<f64>>>,
    /// Optional per-individual weights with the same layout as `values`.
    #[serde(default)]
    pub weights: Option<Vec<Vec<Option<f64>>>>,
}

impl PhenotypeMatrix {
    pub fn new(trait_names: Vec<String>, values: Vec<Vec<Option<f64>>>) -> Result<Self> {
        let matrix = Self {
            trait_names,
            values,
            weights: None,
        };
        matrix.validate()?;
        Ok(matrix)
    }

    pub fn with_weights(mut self, weights: Vec<Vec<Option<f64>>>) -> Result<Self> {
        self.weights = Some(weights);
        self.validate()?;
        Ok(self)
    }

    pub fn n_traits(&self) -> usize {
        self.trait_names.len()
    }

    pub fn n_individuals(&self) -> usize {
        self.values.first().map_or(0, |c| c.len())
    }

    pub fn trait_index(&self, name: &str) -> Option<usize> {
        self.trait_names.iter().position(|t| t == name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.trait_names.is_empty() {
            return Err(RemimError::InvalidData("phenotype matrix has no traits".into()));
        }
        if self.values.len() != self.trait_names.len() {
            return Err(RemimError::InvalidData(format!(
                "{} trait names but {} phenotype columns",
                self.trait_names.len(),
                self.values.len()
            )));
        }
        let n = self.n_individuals();
        if self.values.iter().any(|c| c.len() != n) {
            return Err(RemimError::InvalidData("phenotype columns differ in length".into()));
        }
        if let Some(w) = &self.weights {
            if w.len() != self.values.len() || w.iter().any(|c| c.len() != n) {
                return Err(RemimError::InvalidData(
                    "weights matrix does not match the phenotype matrix".into(),
                ));
            }
        }
        Ok(())
    }

    /// Response for one trait, keeping individuals with an observed value
    /// (and an observed weight when weights are present).
    pub fn response(&self, col: usize) -> Result<Response> {
        let values = &self.values[col];
        let weights = self.weights.as_ref().map(|w| &w[col]);

        let mut individuals = Vec::new();
        let mut y = Vec::new();
        let mut w = Vec::new();
        for (i, v) in values.iter().enumerate() {
            let Some(v) = v.filter(|v| v.is_finite()) else {
                continue;
            };
            if let Some(ws) = weights {
                let Some(wi) = ws[i].filter(|wi| wi.is_finite()) else {
                    continue;
                };
                w.push(wi);
            }
            individuals.push(i);
            y.push(v);
        }

        Response::new(y, weights.map(|_| w), individuals).map_err(|e| match e {
            RemimError::InvalidData(msg) => {
                RemimError::InvalidData(format!("trait '{}': {}", self.trait_names[col], msg))
            }
            other => other,
        })
    }
}

/// Observed phenotype with an intercept-only design.
#[derive(Debug, Clone)]
pub struct Response {
    pub y: Vec<f64>,
    pub x: DenseMatrix,
    pub weights: Option<Vec<f64>>,
    /// Original row of each kept individual.
    pub individuals: Vec<usize>,
}

impl Response {
    pub fn new(y: Vec<f64>, weights: Option<Vec<f64>>, individuals: Vec<usize>) -> Result<Self> {
        let n = y.len();
        if individuals.len() != n {
            return Err(RemimError::InvalidData("individual index length mismatch".into()));
        }
        if n < 3 {
            return Err(RemimError::InvalidData(format!(
                "only {} individuals with observed phenotype",
                n
            )));
        }
        if let Some(w) = &weights {
            if w.len() != n {
                return Err(RemimError::InvalidData("weights length mismatch".into()));
            }
            if w.iter().any(|&wi| wi <= 0.0) {
                return Err(RemimError::InvalidData("weights must be positive".into()));
            }
        }
        Ok(Self {
            y,
            x: DenseMatrix::ones_column(n),
            weights,
            individuals,
        })
    }

    pub fn n(&self) -> usize {
        self.y.len()
    }

    /// Number of fixed effects.
    pub fn p(&self) -> usize {
        self.x.ncols()
    }

    /// Diagonal of the residual structure W^-1 (1/weight, or ones).
    pub fn residual_diag(&self) -> Vec<f64> {
        match &self.weights {
            Some(w) => w.iter().map(|wi| 1.0 / wi).collect(),
            None => vec![1.0; self.n()],
        }
    }

    /// Phenotypes (and weights) reordered by `perm`; kinship rows stay put.
    pub fn permuted(&self, perm: &[usize]) -> Response {
        assert_eq!(perm.len(), self.n());
        Response {
            y: perm.iter().map(|&i| self.y[i]).collect(),
            x: self.x.clone(),
            weights: self
                .weights
                .as_ref()
                .map(|w| perm.iter().map(|&i| w[i]).collect()),
            individuals: self.individuals.clone(),
        }
    }
}
