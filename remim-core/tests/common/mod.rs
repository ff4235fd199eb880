//! Shared simulator for the integration tests.
//!
//! Each individual carries four founder alleles per position (six
//! founders); along a linkage group every allele slot switches founder
//! with a fixed probability per step. Kinship at a position is the
//! centred founder-dosage cross product scaled to diagonal mean 1.

#![allow(dead_code)]

use rand::distributions::Distribution;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;

use remim_core::model::{Genome, KinshipTensor, LinkageGroup, PhenotypeMatrix, QtlData};
use remim_linalg::DenseMatrix;

pub const N_FOUNDERS: usize = 6;
pub const PLOIDY: usize = 4;

/// Founder effects scaled by a QTL's effect size.
const FOUNDER_EFFECTS: [f64; N_FOUNDERS] = [1.0, -1.0, 0.8, -0.8, 0.3, -0.3];

pub struct SimConfig {
    pub n_individuals: usize,
    /// Number of positions per linkage group, spaced 1 cM apart.
    pub group_sizes: Vec<usize>,
    /// (global position, effect size) of each simulated QTL.
    pub qtls: Vec<(usize, f64)>,
    pub switch_prob: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            n_individuals: 150,
            group_sizes: vec![100],
            qtls: Vec::new(),
            switch_prob: 0.08,
            seed: 2024,
        }
    }
}

/// Founder dosages (individuals x founders) at every global position.
fn simulate_dosages(config: &SimConfig, rng: &mut ChaCha8Rng) -> Vec<DenseMatrix> {
    let n = config.n_individuals;
    let mut dosages = Vec::new();
    for &size in &config.group_sizes {
        let mut slots: Vec<[usize; PLOIDY]> = (0..n)
            .map(|_| std::array::from_fn(|_| rng.gen_range(0..N_FOUNDERS)))
            .collect();
        for step in 0..size {
            if step > 0 {
                for individual in slots.iter_mut() {
                    for slot in individual.iter_mut() {
                        if rng.gen::<f64>() < config.switch_prob {
                            *slot = rng.gen_range(0..N_FOUNDERS);
                        }
                    }
                }
            }
            let mut z = DenseMatrix::zeros(n, N_FOUNDERS);
            for (i, individual) in slots.iter().enumerate() {
                for &f in individual {
                    z.set(i, f, z.get(i, f) + 1.0);
                }
            }
            dosages.push(z);
        }
    }
    dosages
}

/// Centred cross product of the dosages, diagonal mean 1.
pub fn kinship_from_dosages(z: &DenseMatrix) -> DenseMatrix {
    let n = z.nrows();
    let centred = DenseMatrix::from_fn(n, z.ncols(), |i, j| {
        let mean = (0..n).map(|k| z.get(k, j)).sum::<f64>() / n as f64;
        z.get(i, j) - mean
    });
    let k = centred.mat_mul(&centred.transpose());
    let scale = k.trace() / n as f64;
    // Exact symmetrisation keeps the tensor's symmetry check happy
    DenseMatrix::from_fn(n, n, |i, j| 0.5 * (k.get(i, j) + k.get(j, i)) / scale)
}

pub fn simulate(config: &SimConfig) -> QtlData {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let dosages = simulate_dosages(config, &mut rng);

    let noise = Normal::new(0.0, 1.0).unwrap();
    let y: Vec<Option<f64>> = (0..config.n_individuals)
        .map(|i| {
            let genetic: f64 = config
                .qtls
                .iter()
                .map(|&(pos, effect)| {
                    (0..N_FOUNDERS)
                        .map(|f| dosages[pos].get(i, f) * FOUNDER_EFFECTS[f] * effect)
                        .sum::<f64>()
                })
                .sum();
            Some(10.0 + genetic + noise.sample(&mut rng))
        })
        .collect();

    let groups = config
        .group_sizes
        .iter()
        .enumerate()
        .map(|(g, &size)| {
            LinkageGroup::new(format!("LG{}", g + 1), (0..size).map(|p| p as f64).collect())
        })
        .collect();
    let genome = Genome::new(groups, Some(1.0)).unwrap();
    let kinship = KinshipTensor::new(dosages.iter().map(kinship_from_dosages).collect()).unwrap();
    let phenotypes = PhenotypeMatrix::new(vec!["trait".to_string()], vec![y]).unwrap();
    QtlData::new(PLOIDY as u8, genome, kinship, phenotypes).unwrap()
}

/// Identity kinship at every position of a single linkage group.
pub fn flat_data(n_individuals: usize, group_sizes: &[usize], seed: u64) -> QtlData {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 1.0).unwrap();
    let y = (0..n_individuals).map(|_| Some(noise.sample(&mut rng))).collect();
    let groups = group_sizes
        .iter()
        .enumerate()
        .map(|(g, &size)| {
            LinkageGroup::new(format!("LG{}", g + 1), (0..size).map(|p| p as f64).collect())
        })
        .collect();
    let genome = Genome::new(groups, None).unwrap();
    let total: usize = group_sizes.iter().sum();
    let kinship = KinshipTensor::new(vec![DenseMatrix::identity(n_individuals); total]).unwrap();
    let phenotypes = PhenotypeMatrix::new(vec!["trait".to_string()], vec![y]).unwrap();
    QtlData::new(4, genome, kinship, phenotypes).unwrap()
}
