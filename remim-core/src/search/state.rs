//! Per-trait mutable search state.

use std::collections::BTreeSet;

use crate::model::Genome;
use crate::score_test::ScoreResult;

use super::scanner::ScanUpdate;

/// An accepted QTL while the search is in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QtlCandidate {
    pub position: usize,
    pub statistic: f64,
    pub pvalue: f64,
}

impl QtlCandidate {
    pub fn new(position: usize, result: ScoreResult) -> Self {
        Self {
            position,
            statistic: result.statistic,
            pvalue: result.pvalue,
        }
    }
}

/// Genome-wide score vectors plus the model in progress.
///
/// Each entry holds the most recent scan that covered the position;
/// `None` means no scan has produced a result there.
#[derive(Debug, Clone)]
pub struct SearchState {
    results: Vec<Option<ScoreResult>>,
    /// Accepted QTL in acceptance order.
    pub qtls: Vec<QtlCandidate>,
    pub round: usize,
    /// Positions rejected during the previous round's refinement.
    pub prev_rejected: BTreeSet<usize>,
}

impl SearchState {
    pub fn new(n_positions: usize) -> Self {
        Self {
            results: vec![None; n_positions],
            qtls: Vec::new(),
            round: 0,
            prev_rejected: BTreeSet::new(),
        }
    }

    /// Merge a sparse scan update; untouched positions keep their values.
    pub fn merge(&mut self, update: &ScanUpdate) {
        for (&pos, &result) in update {
            self.results[pos] = Some(result);
        }
    }

    pub fn result(&self, position: usize) -> Option<ScoreResult> {
        self.results[position]
    }

    pub fn results(&self) -> &[Option<ScoreResult>] {
        &self.results
    }

    pub fn qtl_positions(&self) -> Vec<usize> {
        self.qtls.iter().map(|q| q.position).collect()
    }

    pub fn is_accepted(&self, position: usize) -> bool {
        self.qtls.iter().any(|q| q.position == position)
    }

    pub fn accept(&mut self, position: usize, result: ScoreResult) {
        self.qtls.push(QtlCandidate::new(position, result));
    }

    /// Positions inside the exclusion window of any accepted QTL.
    pub fn exclusion_mask(&self, genome: &Genome, w_size: f64) -> Vec<bool> {
        let mut mask = vec![false; self.results.len()];
        for q in &self.qtls {
            for p in genome.window(q.position, w_size) {
                mask[p] = true;
            }
        }
        mask
    }

    /// Positions outside every exclusion window.
    pub fn non_excluded(&self, genome: &Genome, w_size: f64) -> Vec<usize> {
        self.exclusion_mask(genome, w_size)
            .iter()
            .enumerate()
            .filter_map(|(p, &excluded)| (!excluded).then_some(p))
            .collect()
    }

    /// Highest-statistic position among those not masked out.
    pub fn best_eligible(&self, mask: &[bool]) -> Option<(usize, ScoreResult)> {
        self.results
            .iter()
            .enumerate()
            .filter(|(p, _)| !mask[*p])
            .filter_map(|(p, r)| r.filter(|r| r.statistic.is_finite()).map(|r| (p, r)))
            .max_by(|a, b| a.1.statistic.total_cmp(&b.1.statistic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LinkageGroup;
    use std::collections::BTreeMap;

    fn genome() -> Genome {
        Genome::new(
            vec![
                LinkageGroup::new("LG1", (0..10).map(|i| i as f64 * 5.0).collect()),
                LinkageGroup::new("LG2", (0..5).map(|i| i as f64 * 5.0).collect()),
            ],
            None,
        )
        .unwrap()
    }

    fn r(statistic: f64) -> ScoreResult {
        ScoreResult {
            statistic,
            pvalue: 0.01,
        }
    }

    #[test]
    fn test_merge_is_sparse() {
        let mut state = SearchState::new(15);
        state.merge(&BTreeMap::from([(1, r(2.0)), (3, r(5.0))]));
        state.merge(&BTreeMap::from([(3, r(1.0))]));
        assert_eq!(state.result(1), Some(r(2.0)));
        assert_eq!(state.result(3), Some(r(1.0)));
        assert_eq!(state.result(2), None);
    }

    #[test]
    fn test_exclusion_stays_in_group() {
        let g = genome();
        let mut state = SearchState::new(15);
        // Last position of LG1 at 45 cM, window 10 cM
        state.accept(9, r(3.0));
        let mask = state.exclusion_mask(&g, 10.0);
        let excluded: Vec<usize> = (0..15).filter(|&p| mask[p]).collect();
        assert_eq!(excluded, vec![7, 8, 9]);
        assert_eq!(state.non_excluded(&g, 10.0).len(), 12);
    }

    #[test]
    fn test_best_eligible_skips_masked_and_missing() {
        let mut state = SearchState::new(15);
        state.merge(&BTreeMap::from([
            (0, r(9.0)),
            (4, r(7.0)),
            (5, r(f64::NAN)),
            (6, r(8.0)),
        ]));
        let mut mask = vec![false; 15];
        mask[0] = true;
        assert_eq!(state.best_eligible(&mask).map(|(p, _)| p), Some(6));
        let all = vec![true; 15];
        assert!(state.best_eligible(&all).is_none());
    }

    #[test]
    fn test_accepted_position_is_never_eligible() {
        let g = genome();
        let mut state = SearchState::new(15);
        state.merge(&BTreeMap::from([(2, r(9.0)), (3, r(4.0))]));
        state.accept(2, r(9.0));
        // A zero-width window still covers the accepted position itself
        let mask = state.exclusion_mask(&g, 0.0);
        assert!(mask[2] && !mask[3]);
        assert_eq!(state.best_eligible(&mask).map(|(p, _)| p), Some(3));
    }
}
