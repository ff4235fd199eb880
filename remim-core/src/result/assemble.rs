//! Turn a finished search state into a `TraitResult`.

use crate::model::Genome;
use crate::search::{QtlCandidate, SearchState, Thresholds};

use super::table::{QtlRecord, QtlTable};
use super::TraitResult;

fn record(genome: &Genome, position: usize, statistic: f64, pvalue: f64) -> QtlRecord {
    QtlRecord {
        lg: genome.group_name(genome.group_of(position)).to_string(),
        position_cm: genome.position_cm(position),
        marker: position,
        statistic,
        pvalue,
    }
}

fn bound_record(genome: &Genome, state: &SearchState, q: &QtlCandidate, bound: usize) -> QtlRecord {
    match state.result(bound) {
        Some(r) => record(genome, bound, r.statistic, r.pvalue),
        None => record(genome, bound, q.statistic, q.pvalue),
    }
}

/// Build the per-trait output.
///
/// `support` holds one `(lower, upper)` pair per accepted QTL, or is
/// `None` when support intervals are disabled.
pub fn assemble(
    pheno_col: &str,
    genome: &Genome,
    state: &SearchState,
    support: Option<&[(usize, usize)]>,
    thresholds: Thresholds,
) -> TraitResult {
    let qtls = QtlTable::new(
        state
            .qtls
            .iter()
            .map(|q| record(genome, q.position, q.statistic, q.pvalue))
            .collect(),
    );

    let (lower, upper) = match support {
        Some(bounds) => {
            let lower = state
                .qtls
                .iter()
                .zip(bounds)
                .map(|(q, &(lo, _))| bound_record(genome, state, q, lo))
                .collect();
            let upper = state
                .qtls
                .iter()
                .zip(bounds)
                .map(|(q, &(_, hi))| bound_record(genome, state, q, hi))
                .collect();
            (Some(QtlTable::new(lower)), Some(QtlTable::new(upper)))
        }
        None => (None, None),
    };

    TraitResult {
        pheno_col: pheno_col.to_string(),
        statistic: state.results().iter().map(|r| r.map(|r| r.statistic)).collect(),
        pvalue: state.results().iter().map(|r| r.map(|r| r.pvalue)).collect(),
        qtls,
        lower,
        upper,
        thresholds,
        rounds: state.round,
        model_fit: None,
    }
}
