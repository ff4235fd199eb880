//! Data model: linkage map, kinship tensor, phenotypes and the prepared
//! data object, plus its on-disk serialization.

pub mod genome;
pub mod kinship;
pub mod phenotype;
pub mod qtl_data;
pub mod serialization;

pub use genome::{Genome, LinkageGroup};
pub use kinship::KinshipTensor;
pub use phenotype::{PhenotypeMatrix, Response};
pub use qtl_data::QtlData;
