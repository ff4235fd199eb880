//! Local refinement intervals and support intervals.

use std::ops::RangeInclusive;

use crate::model::Genome;
use crate::score_test::ScoreResult;

/// Positions a QTL at `qtl` may move within, given the other accepted
/// QTL.
///
/// The interval runs to the midpoints with the nearest same-group
/// neighbours (`floor((a + b) / 2)` closes the left interval, the right
/// one opens at the next position), or to the group boundary when there
/// is no neighbour on that side.
pub fn local_interval(genome: &Genome, qtl: usize, others: &[usize]) -> RangeInclusive<usize> {
    let lg = genome.group_of(qtl);
    let range = genome.group_range(lg);

    let left = others
        .iter()
        .copied()
        .filter(|&o| o < qtl && genome.group_of(o) == lg)
        .max();
    let right = others
        .iter()
        .copied()
        .filter(|&o| o > qtl && genome.group_of(o) == lg)
        .min();

    let start = left.map_or(range.start, |a| (a + qtl) / 2 + 1);
    let end = right.map_or(range.end - 1, |b| (qtl + b) / 2);
    start..=end
}

/// Local interval of every QTL in `qtls`, in the same order.
pub fn local_intervals(genome: &Genome, qtls: &[usize]) -> Vec<RangeInclusive<usize>> {
    qtls.iter()
        .enumerate()
        .map(|(i, &q)| {
            let others: Vec<usize> = qtls
                .iter()
                .enumerate()
                .filter_map(|(j, &o)| (j != i).then_some(o))
                .collect();
            local_interval(genome, q, &others)
        })
        .collect()
}

/// -log10(p), with p floored at the smallest positive double.
pub fn neg_log10(p: f64) -> f64 {
    -p.max(f64::MIN_POSITIVE).log10()
}

/// Support interval around `peak` inside `interval`.
///
/// Expands outwards while -log10(p) stays within `d_sint` of the peak;
/// a position without a result ends the expansion on that side.
pub fn support_interval(
    results: &[Option<ScoreResult>],
    interval: &RangeInclusive<usize>,
    peak: usize,
    d_sint: f64,
) -> (usize, usize) {
    let Some(peak_result) = results[peak] else {
        return (peak, peak);
    };
    let cutoff = neg_log10(peak_result.pvalue) - d_sint;
    let qualifies = |p: usize| results[p].is_some_and(|r| neg_log10(r.pvalue) >= cutoff);

    let mut lower = peak;
    while lower > *interval.start() && qualifies(lower - 1) {
        lower -= 1;
    }
    let mut upper = peak;
    while upper < *interval.end() && qualifies(upper + 1) {
        upper += 1;
    }
    (lower, upper)
}
