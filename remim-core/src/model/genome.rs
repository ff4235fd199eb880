//! Linkage map of candidate positions.
//!
//! Positions are numbered globally 0..N in linkage-group order. The
//! cumulative marker counts give O(1) access to the range of one group,
//! and a per-position group table gives O(1) lookup the other way.

use std::ops::{Range, RangeInclusive};

use serde::{Deserialize, Serialize};

use crate::error::{RemimError, Result};

/// One linkage group with its ordered positions in cM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkageGroup {
    pub name: String,
    pub positions_cm: Vec<f64>,
}

impl LinkageGroup {
    pub fn new(name: impl Into<String>, positions_cm: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            positions_cm,
        }
    }

    pub fn len(&self) -> usize {
        self.positions_cm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions_cm.is_empty()
    }
}

/// Serialized form: the groups plus the optional interpolation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GenomeRepr {
    groups: Vec<LinkageGroup>,
    step: Option<f64>,
}

/// Ordered linkage groups with precomputed boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GenomeRepr", into = "GenomeRepr")]
pub struct Genome {
    groups: Vec<LinkageGroup>,
    step: Option<f64>,
    /// cumulative[g] = first global index of group g; last entry = N.
    cumulative: Vec<usize>,
    group_of: Vec<usize>,
}

impl TryFrom<GenomeRepr> for Genome {
    type Error = RemimError;

    fn try_from(repr: GenomeRepr) -> Result<Self> {
        Genome::new(repr.groups, repr.step)
    }
}

impl From<Genome> for GenomeRepr {
    fn from(genome: Genome) -> Self {
        GenomeRepr {
            groups: genome.groups,
            step: genome.step,
        }
    }
}

impl Genome {
    pub fn new(groups: Vec<LinkageGroup>, step: Option<f64>) -> Result<Self> {
        if groups.is_empty() {
            return Err(RemimError::InvalidData("genome has no linkage groups".into()));
        }
        if let Some(s) = step {
            if !s.is_finite() || s <= 0.0 {
                return Err(RemimError::InvalidData(format!("step must be positive, got {}", s)));
            }
        }

        let mut cumulative = Vec::with_capacity(groups.len() + 1);
        let mut group_of = Vec::new();
        cumulative.push(0);
        for (g, group) in groups.iter().enumerate() {
            if group.is_empty() {
                return Err(RemimError::InvalidData(format!(
                    "linkage group '{}' has no positions",
                    group.name
                )));
            }
            if group.positions_cm.iter().any(|p| !p.is_finite()) {
                return Err(RemimError::InvalidData(format!(
                    "linkage group '{}' has a non-finite position",
                    group.name
                )));
            }
            if group.positions_cm.windows(2).any(|w| w[1] < w[0]) {
                return Err(RemimError::InvalidData(format!(
                    "positions in linkage group '{}' are not ordered by cM",
                    group.name
                )));
            }
            group_of.extend(std::iter::repeat(g).take(group.len()));
            cumulative.push(group_of.len());
        }

        Ok(Self {
            groups,
            step,
            cumulative,
            group_of,
        })
    }

    /// Total number of candidate positions.
    pub fn n_positions(&self) -> usize {
        self.group_of.len()
    }

    pub fn n_groups(&self) -> usize {
        self.groups.len()
    }

    pub fn groups(&self) -> &[LinkageGroup] {
        &self.groups
    }

    pub fn step(&self) -> Option<f64> {
        self.step
    }

    /// Cumulative marker counts at each group boundary (length groups + 1).
    pub fn cumulative_marker_count(&self) -> &[usize] {
        &self.cumulative
    }

    /// Linkage group holding global position `idx`.
    pub fn group_of(&self, idx: usize) -> usize {
        self.group_of[idx]
    }

    pub fn group_name(&self, lg: usize) -> &str {
        &self.groups[lg].name
    }

    /// Global index range of one linkage group.
    pub fn group_range(&self, lg: usize) -> Range<usize> {
        self.cumulative[lg]..self.cumulative[lg + 1]
    }

    /// Genetic position of global index `idx`.
    pub fn position_cm(&self, idx: usize) -> f64 {
        let lg = self.group_of[idx];
        self.groups[lg].positions_cm[idx - self.cumulative[lg]]
    }

    /// Distance in cM, or `None` when the positions sit on different groups.
    pub fn distance_cm(&self, a: usize, b: usize) -> Option<f64> {
        (self.group_of(a) == self.group_of(b))
            .then(|| (self.position_cm(a) - self.position_cm(b)).abs())
    }

    /// Positions of `idx`'s group lying within `w_size` cM of it.
    ///
    /// Always contains `idx` and never leaves its linkage group.
    pub fn window(&self, idx: usize, w_size: f64) -> RangeInclusive<usize> {
        let range = self.group_range(self.group_of(idx));
        let center = self.position_cm(idx);

        let mut lo = idx;
        while lo > range.start && center - self.position_cm(lo - 1) <= w_size {
            lo -= 1;
        }
        let mut hi = idx;
        while hi + 1 < range.end && self.position_cm(hi + 1) - center <= w_size {
            hi += 1;
        }
        lo..=hi
    }
}
