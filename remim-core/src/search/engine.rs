//! REMIM search engine.
//!
//! Per trait: an initial genome scan, then rounds of forward search and
//! backward elimination until the accepted set stops changing, then a
//! profile pass that refreshes statistics and support intervals.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::RemimConfig;
use crate::error::{RemimError, Result};
use crate::lmm::{AiReml, KinshipList, VarianceComponentFit};
use crate::model::{Genome, KinshipTensor, QtlData, Response};
use crate::result::{assemble, format_pvalue, RemimOutput, RunMetadata, TraitFailure, TraitResult};
use crate::score_test::permutation::NullDistribution;
use crate::score_test::{ScoreTest, VarianceComponentScoreTest};

use super::intervals::{local_interval, support_interval};
use super::scanner::{scan, ScanUpdate};
use super::state::{QtlCandidate, SearchState};
use super::thresholds::Thresholds;

pub struct RemimEngine<S = VarianceComponentScoreTest, F = AiReml> {
    config: RemimConfig,
    test: S,
    fitter: F,
}

impl RemimEngine {
    /// Engine with the default score test and AI-REML fitter.
    pub fn new(config: RemimConfig) -> Result<Self> {
        Self::with_components(config, VarianceComponentScoreTest, AiReml::default())
    }
}

impl<S: ScoreTest, F: VarianceComponentFit> RemimEngine<S, F> {
    pub fn with_components(config: RemimConfig, test: S, fitter: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            test,
            fitter,
        })
    }

    pub fn config(&self) -> &RemimConfig {
        &self.config
    }

    pub fn test(&self) -> &S {
        &self.test
    }

    pub fn fitter(&self) -> &F {
        &self.fitter
    }

    /// Search every selected trait in parallel on a dedicated pool.
    ///
    /// A failing trait is recorded in `failures` and does not stop the
    /// others.
    pub fn run(
        &self,
        data: &QtlData,
        pheno_cols: Option<&[String]>,
        null: Option<&NullDistribution>,
    ) -> Result<RemimOutput> {
        data.validate()?;
        let cols = data.trait_columns(pheno_cols)?;

        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = self.config.n_clusters {
            builder = builder.num_threads(n);
        }
        let pool = builder
            .build()
            .map_err(|e| RemimError::InvalidConfig(format!("cannot build worker pool: {}", e)))?;

        info!(
            "REMIM on {} trait(s), {} positions, {} worker(s)",
            cols.len(),
            data.genome.n_positions(),
            pool.current_num_threads()
        );

        let outcomes: Vec<(String, Result<TraitResult>)> = pool.install(|| {
            cols.par_iter()
                .map(|&col| {
                    let name = data.phenotypes.trait_names[col].clone();
                    let null_p = null.and_then(|n| n.get(&name));
                    let outcome = self.run_trait(data, col, null_p);
                    (name, outcome)
                })
                .collect()
        });

        let mut traits = Vec::new();
        let mut failures = Vec::new();
        for (pheno_col, outcome) in outcomes {
            match outcome {
                Ok(result) => traits.push(result),
                Err(e) => {
                    warn!("Trait {} failed: {}", pheno_col, e);
                    failures.push(TraitFailure {
                        pheno_col,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(RemimOutput {
            metadata: RunMetadata::new(&self.config, data),
            traits,
            failures,
        })
    }

    /// Full search for one phenotype column.
    pub fn run_trait(
        &self,
        data: &QtlData,
        pheno_col: usize,
        null_min_p: Option<&[f64]>,
    ) -> Result<TraitResult> {
        let name = trait_name(data, pheno_col)?;
        let thresholds = match null_min_p {
            Some(min_p) => Thresholds::from_null(&self.config, min_p)?,
            None => Thresholds::from_config(&self.config),
        };
        let response = data.phenotypes.response(pheno_col)?;
        let kinship = data.kinship.subset(&response.individuals)?;
        info!(
            "Trait {}: {} individuals, thresholds fwd={} bwd={}",
            name,
            response.n(),
            format_pvalue(thresholds.forward),
            format_pvalue(thresholds.backward)
        );

        let search = TraitSearch {
            engine: self,
            genome: &data.genome,
            response: &response,
            kinship: kinship.as_ref(),
        };
        let mut state = search.search(thresholds)?;
        let support = search.profile(&mut state)?;

        info!(
            "Trait {}: {} QTL after {} round(s)",
            name,
            state.qtls.len(),
            state.round
        );
        Ok(assemble(
            name,
            &data.genome,
            &state,
            support.as_deref(),
            thresholds,
        ))
    }

    /// Profile a fixed QTL set without searching.
    ///
    /// Rescans each QTL's local interval, computes support intervals and
    /// fills the rest of the genome; the set itself is never changed.
    pub fn profile_trait(
        &self,
        data: &QtlData,
        pheno_col: usize,
        qtls: &[usize],
    ) -> Result<TraitResult> {
        let name = trait_name(data, pheno_col)?;
        let n = data.genome.n_positions();
        if let Some(&bad) = qtls.iter().find(|&&q| q >= n) {
            return Err(RemimError::InvalidData(format!(
                "QTL position {} out of range ({} positions)",
                bad, n
            )));
        }
        let response = data.phenotypes.response(pheno_col)?;
        let kinship = data.kinship.subset(&response.individuals)?;
        let search = TraitSearch {
            engine: self,
            genome: &data.genome,
            response: &response,
            kinship: kinship.as_ref(),
        };

        let mut state = SearchState::new(n);
        for &q in qtls {
            state.qtls.push(QtlCandidate {
                position: q,
                statistic: f64::NAN,
                pvalue: f64::NAN,
            });
        }
        let support = search.profile(&mut state)?;
        Ok(assemble(
            name,
            &data.genome,
            &state,
            support.as_deref(),
            Thresholds::from_config(&self.config),
        ))
    }
}

fn trait_name(data: &QtlData, pheno_col: usize) -> Result<&str> {
    data.phenotypes
        .trait_names
        .get(pheno_col)
        .map(String::as_str)
        .ok_or_else(|| {
            RemimError::InvalidData(format!(
                "phenotype column {} out of range ({} traits)",
                pheno_col,
                data.phenotypes.n_traits()
            ))
        })
}

/// Borrowed context for one trait's search.
struct TraitSearch<'a, S, F> {
    engine: &'a RemimEngine<S, F>,
    genome: &'a Genome,
    response: &'a Response,
    kinship: &'a KinshipTensor,
}

impl<S: ScoreTest, F: VarianceComponentFit> TraitSearch<'_, S, F> {
    fn config(&self) -> &RemimConfig {
        &self.engine.config
    }

    fn background(&self, qtls: &[usize]) -> KinshipList<'_> {
        KinshipList::background(self.kinship, qtls, self.config().polygenes)
    }

    /// Variance ratios for the background built from `qtls`.
    fn fit_tau(&self, qtls: &[usize]) -> Result<Vec<f64>> {
        let background = self.background(qtls);
        if background.is_empty() {
            return Ok(Vec::new());
        }
        let fit = self.engine.fitter.fit(self.response, &background)?;
        if !fit.is_converged() {
            debug!(
                "Variance components for {:?} did not converge after {} iterations",
                qtls, fit.iterations
            );
        }
        Ok(fit.tau)
    }

    /// Like `fit_tau`, but a failed fit falls back to zero ratios.
    fn fit_tau_or_zero(&self, qtls: &[usize]) -> Result<Vec<f64>> {
        match self.fit_tau(qtls) {
            Ok(tau) => Ok(tau),
            Err(e @ RemimError::Fit { .. }) => {
                warn!("{}; scanning with zero background variance", e);
                Ok(vec![0.0; self.background(qtls).len()])
            }
            Err(e) => Err(e),
        }
    }

    fn scan(&self, qtls: &[usize], tau: &[f64], positions: &[usize]) -> Result<ScanUpdate> {
        scan(
            &self.engine.test,
            self.response,
            &self.background(qtls),
            tau,
            self.kinship,
            positions,
        )
    }

    fn describe(&self, position: usize) -> String {
        format!(
            "{} ({} {:.2} cM)",
            position,
            self.genome.group_name(self.genome.group_of(position)),
            self.genome.position_cm(position)
        )
    }

    fn search(&self, thresholds: Thresholds) -> Result<SearchState> {
        let n = self.genome.n_positions();
        let mut state = SearchState::new(n);
        let all: Vec<usize> = (0..n).collect();
        let initial = self.scan(&[], &[], &all)?;
        state.merge(&initial);

        let mut threshold = thresholds.forward;
        loop {
            let added = self.forward(&mut state, threshold)?;

            // Tightened once refinement starts and never loosened
            threshold = thresholds.backward;
            let rejected = self.backward(&mut state, thresholds.backward)?;
            self.rescan_background(&mut state)?;

            let settled = added.iter().all(|p| state.prev_rejected.contains(p))
                && rejected == state.prev_rejected;
            state.prev_rejected = rejected;

            if settled {
                debug!("Search settled after {} round(s)", state.round);
                break;
            }
            if self.config().round_cap_reached(state.round) {
                info!("Round cap {} reached", state.round);
                break;
            }
        }
        Ok(state)
    }

    /// Accept positions one at a time while the best one is significant.
    /// Returns the positions accepted.
    fn forward(&self, state: &mut SearchState, threshold: f64) -> Result<Vec<usize>> {
        let w_size = self.config().w_size;
        let mut added = Vec::new();

        while !self.config().round_cap_reached(state.round) {
            let mask = state.exclusion_mask(self.genome, w_size);
            let Some((best, result)) = state.best_eligible(&mask) else {
                debug!("No eligible position left for forward search");
                break;
            };
            state.round += 1;

            if result.pvalue > threshold {
                debug!(
                    "Best position {} has p = {}, above {}",
                    self.describe(best),
                    format_pvalue(result.pvalue),
                    format_pvalue(threshold)
                );
                break;
            }
            // Duplicate stop; an accepted position always lies in its own masked window
            if state.is_accepted(best) {
                debug!("Best position {} is already accepted", best);
                break;
            }

            info!(
                "Round {}: accepted QTL at {}, p = {}",
                state.round,
                self.describe(best),
                format_pvalue(result.pvalue)
            );
            state.accept(best, result);
            added.push(best);

            let remaining = state.non_excluded(self.genome, w_size);
            if remaining.is_empty() {
                debug!("Every position lies inside an exclusion window");
                break;
            }
            let qtls = state.qtl_positions();
            let tau = self.fit_tau_or_zero(&qtls)?;
            let update = self.scan(&qtls, &tau, &remaining)?;
            state.merge(&update);
        }
        Ok(added)
    }

    /// Refinement passes until a fixed point or a repeated rejection
    /// set. Returns every position rejected during this phase.
    fn backward(&self, state: &mut SearchState, threshold: f64) -> Result<BTreeSet<usize>> {
        let w_size = self.config().w_size;
        let mut all_rejected = BTreeSet::new();
        let mut prev_pass: Option<BTreeSet<usize>> = None;
        let mut pass = 0;

        while !state.qtls.is_empty() {
            pass += 1;
            let mut rejected = BTreeSet::new();
            let mut moved_far = false;

            let mut i = 0;
            while i < state.qtls.len() {
                let q = state.qtls[i].position;
                let others: Vec<usize> = state
                    .qtls
                    .iter()
                    .enumerate()
                    .filter_map(|(j, c)| (j != i).then_some(c.position))
                    .collect();
                let interval = local_interval(self.genome, q, &others);

                let update = match self.scan_interval(&others, &interval) {
                    Ok(update) => update,
                    Err(e @ RemimError::Fit { .. }) => {
                        warn!("Keeping QTL at {} in place: {}", self.describe(q), e);
                        i += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                state.merge(&update);

                let best = update
                    .iter()
                    .filter(|(_, r)| r.statistic.is_finite())
                    .max_by(|a, b| a.1.statistic.total_cmp(&b.1.statistic));
                match best {
                    None => {
                        warn!("No score in the interval of QTL {}; keeping it", self.describe(q));
                        i += 1;
                    }
                    Some((_, r)) if r.pvalue > threshold => {
                        info!(
                            "Pass {}: rejected QTL at {}, best p = {}",
                            pass,
                            self.describe(q),
                            format_pvalue(r.pvalue)
                        );
                        rejected.insert(q);
                        state.qtls.remove(i);
                    }
                    Some((&pos, &r)) => {
                        if pos != q {
                            debug!("Pass {}: QTL moved {} -> {}", pass, self.describe(q), self.describe(pos));
                            let distance = self.genome.distance_cm(q, pos).unwrap_or(f64::INFINITY);
                            moved_far |= distance > w_size;
                        }
                        state.qtls[i] = QtlCandidate::new(pos, r);
                        i += 1;
                    }
                }
            }

            for position in self.collapse_close(state) {
                rejected.insert(position);
            }
            all_rejected.extend(rejected.iter().copied());

            if rejected.is_empty() && !moved_far {
                debug!("Refinement reached a fixed point after {} pass(es)", pass);
                break;
            }
            if prev_pass.as_ref() == Some(&rejected) {
                info!("Refinement repeated rejections {:?}; stopping", rejected);
                break;
            }
            prev_pass = Some(rejected);
        }
        Ok(all_rejected)
    }

    fn scan_interval(&self, others: &[usize], interval: &RangeInclusive<usize>) -> Result<ScanUpdate> {
        let tau = self.fit_tau(others)?;
        let positions: Vec<usize> = interval.clone().collect();
        self.scan(others, &tau, &positions)
    }

    /// Drop the weaker of any two same-group QTL closer than `w_size`.
    fn collapse_close(&self, state: &mut SearchState) -> Vec<usize> {
        let w_size = self.config().w_size;
        let mut removed = Vec::new();
        loop {
            let pair = (0..state.qtls.len())
                .flat_map(|i| ((i + 1)..state.qtls.len()).map(move |j| (i, j)))
                .find(|&(i, j)| {
                    self.genome
                        .distance_cm(state.qtls[i].position, state.qtls[j].position)
                        .is_some_and(|d| d < w_size)
                });
            let Some((i, j)) = pair else { break };
            let drop = if state.qtls[i].pvalue <= state.qtls[j].pvalue { j } else { i };
            let gone = state.qtls.remove(drop);
            info!("Dropped QTL at {} within {} cM of another", self.describe(gone.position), w_size);
            removed.push(gone.position);
        }
        removed
    }

    /// Rescan all non-excluded positions under the current set.
    fn rescan_background(&self, state: &mut SearchState) -> Result<()> {
        let remaining = state.non_excluded(self.genome, self.config().w_size);
        if remaining.is_empty() {
            return Ok(());
        }
        let qtls = state.qtl_positions();
        let tau = self.fit_tau_or_zero(&qtls)?;
        let update = self.scan(&qtls, &tau, &remaining)?;
        state.merge(&update);
        Ok(())
    }

    /// Refresh each QTL from its local interval, compute support
    /// intervals, then fill positions outside every interval.
    fn profile(&self, state: &mut SearchState) -> Result<Option<Vec<(usize, usize)>>> {
        let n = self.genome.n_positions();
        let positions = state.qtl_positions();
        let mut covered = vec![false; n];
        let mut support = Vec::with_capacity(positions.len());

        for (i, &q) in positions.iter().enumerate() {
            let others: Vec<usize> = positions
                .iter()
                .enumerate()
                .filter_map(|(j, &o)| (j != i).then_some(o))
                .collect();
            let interval = local_interval(self.genome, q, &others);
            for p in interval.clone() {
                covered[p] = true;
            }

            match self.scan_interval(&others, &interval) {
                Ok(update) => state.merge(&update),
                Err(e @ RemimError::Fit { .. }) => {
                    warn!("Profile of QTL at {} skipped: {}", self.describe(q), e)
                }
                Err(e) => return Err(e),
            }
            if let Some(r) = state.result(q) {
                state.qtls[i] = QtlCandidate::new(q, r);
            }
            if let Some(d_sint) = self.config().d_sint {
                support.push(support_interval(state.results(), &interval, q, d_sint));
            }
        }

        let loose: Vec<usize> = (0..n).filter(|&p| !covered[p]).collect();
        if !loose.is_empty() {
            let tau = self.fit_tau_or_zero(&positions)?;
            let update = self.scan(&positions, &tau, &loose)?;
            state.merge(&update);
        }

        Ok(self.config().d_sint.map(|_| support))
    }
}
