//! remim-core: random-effect multiple interval mapping (REMIM)
//!
//! Multiple-QTL search in polyploid populations driven by variance
//! component score tests: data model, AI-REML fitting, score tests,
//! genome scans, the forward/backward search engine, result tables,
//! permutation thresholds and serialization.

pub mod config;
pub mod error;
pub mod lmm;
pub mod model;
pub mod result;
pub mod score_test;
pub mod search;

pub use config::RemimConfig;
pub use error::{RemimError, Result};
pub use model::{Genome, KinshipTensor, LinkageGroup, PhenotypeMatrix, QtlData, Response};
pub use result::{QtlRecord, QtlTable, RemimOutput, TraitResult};
pub use search::RemimEngine;
