//! The prepared data object consumed by the search engine.

use serde::{Deserialize, Serialize};

use super::genome::Genome;
use super::kinship::KinshipTensor;
use super::phenotype::PhenotypeMatrix;
use crate::error::{RemimError, Result};

/// Phenotypes, per-position relationship matrices and the linkage map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QtlData {
    /// Ploidy of the population (passed through to outputs).
    pub ploidy: u8,
    pub genome: Genome,
    pub kinship: KinshipTensor,
    pub phenotypes: PhenotypeMatrix,
}

impl QtlData {
    pub fn new(
        ploidy: u8,
        genome: Genome,
        kinship: KinshipTensor,
        phenotypes: PhenotypeMatrix,
    ) -> Result<Self> {
        let data = Self {
            ploidy,
            genome,
            kinship,
            phenotypes,
        };
        data.validate()?;
        Ok(data)
    }

    /// Cross-check dimensions between the components.
    pub fn validate(&self) -> Result<()> {
        if self.genome.n_positions() != self.kinship.n_positions() {
            return Err(RemimError::InvalidData(format!(
                "genome has {} positions but kinship tensor has {}",
                self.genome.n_positions(),
                self.kinship.n_positions()
            )));
        }
        self.phenotypes.validate()?;
        if self.phenotypes.n_individuals() != self.kinship.n_individuals() {
            return Err(RemimError::InvalidData(format!(
                "phenotype matrix has {} individuals but kinship matrices are {}x{}",
                self.phenotypes.n_individuals(),
                self.kinship.n_individuals(),
                self.kinship.n_individuals()
            )));
        }
        Ok(())
    }

    /// Resolve trait names to column indices; `None` selects every trait.
    pub fn trait_columns(&self, names: Option<&[String]>) -> Result<Vec<usize>> {
        match names {
            None => Ok((0..self.phenotypes.n_traits()).collect()),
            Some(names) => names
                .iter()
                .map(|name| {
                    self.phenotypes.trait_index(name).ok_or_else(|| {
                        RemimError::InvalidData(format!("unknown phenotype column '{}'", name))
                    })
                })
                .collect(),
        }
    }
}
