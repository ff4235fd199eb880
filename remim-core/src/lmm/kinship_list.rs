//! Ordered, named list of variance-covariance components.
//!
//! Built once per decision point and passed unchanged to the score test
//! and the variance-component fit. Position matrices are borrowed from
//! the kinship tensor; only the polygenic average is owned.

use std::borrow::Cow;
use std::fmt;

use remim_linalg::DenseMatrix;

use crate::model::KinshipTensor;

/// Identity of one variance component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Component {
    /// An accepted QTL at a global position.
    Qtl(usize),
    /// Mean of the accepted QTL matrices.
    Polygenic,
    /// The position under test.
    Candidate(usize),
}

impl Component {
    pub fn position(&self) -> Option<usize> {
        match self {
            Component::Qtl(p) | Component::Candidate(p) => Some(*p),
            Component::Polygenic => None,
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Qtl(p) => write!(f, "Q{}", p),
            Component::Polygenic => write!(f, "polygenic"),
            Component::Candidate(p) => write!(f, "candidate {}", p),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct KinshipList<'a> {
    components: Vec<(Component, Cow<'a, DenseMatrix>)>,
}

impl<'a> KinshipList<'a> {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> KinshipListBuilder<'a> {
        KinshipListBuilder::default()
    }

    /// Background for a set of accepted QTL: one component each, or a
    /// single polygenic average when `polygenes` is set.
    pub fn background(tensor: &'a KinshipTensor, qtls: &[usize], polygenes: bool) -> Self {
        let builder = Self::builder();
        if polygenes {
            match tensor.mean_of(qtls) {
                Some(mean) => builder.polygenic(mean).build(),
                None => builder.build(),
            }
        } else {
            qtls.iter()
                .fold(builder, |b, &q| b.qtl(q, tensor.get(q)))
                .build()
        }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn names(&self) -> Vec<Component> {
        self.components.iter().map(|(c, _)| *c).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Component, &DenseMatrix)> {
        self.components.iter().map(|(c, m)| (*c, m.as_ref()))
    }

    pub fn matrix(&self, i: usize) -> &DenseMatrix {
        self.components[i].1.as_ref()
    }

    /// Split into the preceding components and the last one.
    pub fn split_last(&self) -> Option<(KinshipList<'_>, Component, &DenseMatrix)> {
        let ((last, matrix), rest) = self.components.split_last()?;
        let baseline = KinshipList {
            components: rest
                .iter()
                .map(|(c, m)| (*c, Cow::Borrowed(m.as_ref())))
                .collect(),
        };
        Some((baseline, *last, matrix.as_ref()))
    }

    /// sigma_e * diag(residual) + sum_j sigma_j * K_j.
    pub fn covariance(&self, residual_diag: &[f64], sigma_e: f64, sigma: &[f64]) -> DenseMatrix {
        assert_eq!(sigma.len(), self.len());
        let scaled: Vec<f64> = residual_diag.iter().map(|r| sigma_e * r).collect();
        let mut v = DenseMatrix::from_diag(&scaled);
        for ((_, k), &s) in self.components.iter().zip(sigma.iter()) {
            if s != 0.0 {
                v.add_scaled(k, s);
            }
        }
        v
    }
}

#[derive(Debug, Default)]
pub struct KinshipListBuilder<'a> {
    components: Vec<(Component, Cow<'a, DenseMatrix>)>,
}

impl<'a> KinshipListBuilder<'a> {
    pub fn qtl(mut self, position: usize, matrix: &'a DenseMatrix) -> Self {
        self.components
            .push((Component::Qtl(position), Cow::Borrowed(matrix)));
        self
    }

    pub fn polygenic(mut self, matrix: DenseMatrix) -> Self {
        self.components.push((Component::Polygenic, Cow::Owned(matrix)));
        self
    }

    pub fn candidate(mut self, position: usize, matrix: &'a DenseMatrix) -> Self {
        self.components
            .push((Component::Candidate(position), Cow::Borrowed(matrix)));
        self
    }

    pub fn build(self) -> KinshipList<'a> {
        KinshipList {
            components: self.components,
        }
    }
}
