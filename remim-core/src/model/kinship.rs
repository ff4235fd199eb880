//! Per-position additive relationship matrices.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use remim_linalg::DenseMatrix;

use crate::error::{RemimError, Result};

/// Column-major storage used on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct KinshipRepr {
    n_individuals: usize,
    matrices: Vec<Vec<f64>>,
}

/// One symmetric individuals x individuals matrix per candidate position.
///
/// Read-only to the search: scans borrow matrices, and only a trait's
/// individual subset is materialized as a new tensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "KinshipRepr", into = "KinshipRepr")]
pub struct KinshipTensor {
    n_individuals: usize,
    matrices: Vec<DenseMatrix>,
}

impl TryFrom<KinshipRepr> for KinshipTensor {
    type Error = RemimError;

    fn try_from(repr: KinshipRepr) -> Result<Self> {
        let n = repr.n_individuals;
        let matrices = repr
            .matrices
            .into_iter()
            .enumerate()
            .map(|(pos, data)| {
                if data.len() != n * n {
                    return Err(RemimError::InvalidData(format!(
                        "kinship matrix {} has {} entries, expected {}",
                        pos,
                        data.len(),
                        n * n
                    )));
                }
                Ok(DenseMatrix::from_col_major(n, n, data))
            })
            .collect::<Result<Vec<_>>>()?;
        KinshipTensor::new(matrices)
    }
}

impl From<KinshipTensor> for KinshipRepr {
    fn from(tensor: KinshipTensor) -> Self {
        KinshipRepr {
            n_individuals: tensor.n_individuals,
            matrices: tensor.matrices.iter().map(|m| m.to_col_major()).collect(),
        }
    }
}

impl KinshipTensor {
    const SYMMETRY_TOL: f64 = 1e-8;

    pub fn new(matrices: Vec<DenseMatrix>) -> Result<Self> {
        let n_individuals = matrices
            .first()
            .map(|m| m.nrows())
            .ok_or_else(|| RemimError::InvalidData("kinship tensor has no positions".into()))?;

        for (pos, m) in matrices.iter().enumerate() {
            if m.nrows() != n_individuals || m.ncols() != n_individuals {
                return Err(RemimError::InvalidData(format!(
                    "kinship matrix {} is {}x{}, expected {}x{}",
                    pos,
                    m.nrows(),
                    m.ncols(),
                    n_individuals,
                    n_individuals
                )));
            }
            if !m.is_finite() {
                return Err(RemimError::InvalidData(format!(
                    "kinship matrix {} has non-finite entries",
                    pos
                )));
            }
            if !m.is_symmetric(Self::SYMMETRY_TOL) {
                return Err(RemimError::InvalidData(format!(
                    "kinship matrix {} is not symmetric",
                    pos
                )));
            }
        }

        Ok(Self {
            n_individuals,
            matrices,
        })
    }

    pub fn n_positions(&self) -> usize {
        self.matrices.len()
    }

    pub fn n_individuals(&self) -> usize {
        self.n_individuals
    }

    pub fn get(&self, position: usize) -> &DenseMatrix {
        &self.matrices[position]
    }

    /// Rescale every matrix so that its diagonal mean is 1.
    pub fn normalize_diagonal(&mut self) -> Result<()> {
        for (pos, m) in self.matrices.iter_mut().enumerate() {
            let mean = m.trace() / self.n_individuals as f64;
            if mean <= 0.0 || !mean.is_finite() {
                return Err(RemimError::InvalidData(format!(
                    "kinship matrix {} has non-positive diagonal mean {}",
                    pos, mean
                )));
            }
            *m = m.scale(1.0 / mean);
        }
        Ok(())
    }

    /// Restrict every matrix to the rows/columns in `individuals`.
    ///
    /// Borrows `self` when the subset is every individual in order.
    pub fn subset(&self, individuals: &[usize]) -> Result<Cow<'_, KinshipTensor>> {
        if let Some(&bad) = individuals.iter().find(|&&i| i >= self.n_individuals) {
            return Err(RemimError::InvalidData(format!(
                "individual index {} out of range ({} individuals)",
                bad, self.n_individuals
            )));
        }
        if individuals.len() == self.n_individuals
            && individuals.iter().enumerate().all(|(k, &i)| k == i)
        {
            return Ok(Cow::Borrowed(self));
        }
        Ok(Cow::Owned(KinshipTensor {
            n_individuals: individuals.len(),
            matrices: self
                .matrices
                .iter()
                .map(|m| m.select_symmetric(individuals))
                .collect(),
        }))
    }

    /// Element-wise mean of the matrices at `positions`.
    pub fn mean_of(&self, positions: &[usize]) -> Option<DenseMatrix> {
        let (&first, rest) = positions.split_first()?;
        let mut acc = self.matrices[first].clone();
        for &p in rest {
            acc.add_scaled(&self.matrices[p], 1.0);
        }
        Some(acc.scale(1.0 / positions.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tensor() -> KinshipTensor {
        KinshipTensor::new(vec![
            DenseMatrix::from_row_major(3, 3, &[2.0, 0.5, 0.0, 0.5, 2.0, 0.1, 0.0, 0.1, 2.0]),
            DenseMatrix::identity(3),
        ])
        .unwrap()
    }

    #[test]
    fn test_normalize_diagonal() {
        let mut k = tensor();
        k.normalize_diagonal().unwrap();
        assert!((k.get(0).trace() / 3.0 - 1.0).abs() < 1e-12);
        assert!((k.get(0).get(0, 1) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_subset_and_mean() {
        let k = tensor();
        let sub = k.subset(&[0, 2]).unwrap();
        assert_eq!(sub.n_individuals(), 2);
        assert_eq!(sub.get(0).get(0, 1), 0.0);
        assert!(k.subset(&[3]).is_err());
        assert!(matches!(k.subset(&[0, 1, 2]).unwrap(), Cow::Borrowed(_)));

        let mean = k.mean_of(&[0, 1]).unwrap();
        assert!((mean.get(0, 0) - 1.5).abs() < 1e-12);
        assert!((mean.get(0, 1) - 0.25).abs() < 1e-12);
        assert!(k.mean_of(&[]).is_none());
    }

    #[test]
    fn test_rejects_asymmetric_and_mismatched() {
        let asym = DenseMatrix::from_row_major(2, 2, &[1.0, 0.3, 0.0, 1.0]);
        assert!(KinshipTensor::new(vec![asym]).is_err());
        assert!(KinshipTensor::new(vec![DenseMatrix::identity(2), DenseMatrix::identity(3)]).is_err());
        assert!(KinshipTensor::new(vec![]).is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let k = tensor();
        let json = serde_json::to_string(&k).unwrap();
        let back: KinshipTensor = serde_json::from_str(&json).unwrap();
        assert_eq!(back.n_positions(), 2);
        assert_eq!(back.get(0).get(1, 2), 0.1);
    }
}
