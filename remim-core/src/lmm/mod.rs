//! Linear mixed model machinery: component lists, the REML projection
//! and variance-component estimation.

pub mod ai_reml;
pub mod kinship_list;
pub mod projection;

pub use ai_reml::{AiReml, AiRemlConfig, FitStatus, VarianceComponentFit, VcFit};
pub use kinship_list::{Component, KinshipList, KinshipListBuilder};
pub use projection::Projection;
