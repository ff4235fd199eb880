//! The REMIM search: genome scans, forward search, backward
//! elimination with position refinement, and profiling.

pub mod engine;
pub mod intervals;
pub mod scanner;
pub mod state;
pub mod thresholds;

pub use engine::RemimEngine;
pub use scanner::{scan, ScanUpdate};
pub use state::{QtlCandidate, SearchState};
pub use thresholds::Thresholds;
