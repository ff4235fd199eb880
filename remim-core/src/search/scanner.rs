//! Genome scanner: one score test per requested position.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::debug;

use crate::error::{RemimError, Result};
use crate::lmm::KinshipList;
use crate::model::{KinshipTensor, Response};
use crate::score_test::{ScoreResult, ScoreTest};

/// Sparse scan result keyed by global position.
pub type ScanUpdate = BTreeMap<usize, ScoreResult>;

/// Score every position in `positions` against `baseline`.
///
/// The null model is prepared once; positions whose test fails are
/// absent from the returned map.
pub fn scan<S: ScoreTest + ?Sized>(
    test: &S,
    response: &Response,
    baseline: &KinshipList<'_>,
    tau: &[f64],
    kinship: &KinshipTensor,
    positions: &[usize],
) -> Result<ScanUpdate> {
    if positions.is_empty() {
        return Err(RemimError::NoCandidate {
            context: format!("scan against {} background components", baseline.len()),
        });
    }
    let scorer = test.null_model(response, baseline, tau)?;

    let update: ScanUpdate = positions
        .par_iter()
        .filter_map(|&pos| match scorer.score(pos, kinship.get(pos)) {
            Ok(result) => Some((pos, result)),
            Err(e) => {
                debug!("Skipping position {}: {}", pos, e);
                None
            }
        })
        .collect();

    if update.len() < positions.len() {
        debug!(
            "Scan returned {} of {} positions",
            update.len(),
            positions.len()
        );
    }
    Ok(update)
}
