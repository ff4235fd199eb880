//! Permutation null distribution.
//!
//! remim permute --data data.bin --output null.bin --n-perm 1000 --seed 12345

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use remim_core::model::serialization;
use remim_core::score_test::permutation::build_null_distribution;
use remim_core::score_test::VarianceComponentScoreTest;

#[derive(Args)]
pub struct PermuteArgs {
    /// Prepared data object (.json or binary)
    #[arg(long)]
    data: PathBuf,

    /// Output file; `.json` writes JSON, anything else binary
    #[arg(long)]
    output: PathBuf,

    /// Number of permutations
    #[arg(long, default_value = "1000")]
    n_perm: usize,

    /// Random seed
    #[arg(long, default_value = "12345")]
    seed: u64,

    /// Trait names to permute (comma-separated); all traits if omitted
    #[arg(long, value_delimiter = ',')]
    pheno_col: Option<Vec<String>>,
}

pub fn run(args: PermuteArgs, threads: Option<usize>) -> Result<()> {
    info!("=== REMIM permutation null ===");
    let data = serialization::load_data(&args.data)?;

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    let pool = builder.build()?;
    info!("Using {} thread(s)", pool.current_num_threads());

    let null = pool.install(|| {
        build_null_distribution(
            &VarianceComponentScoreTest,
            &data,
            args.pheno_col.as_deref(),
            args.n_perm,
            args.seed,
        )
    })?;

    serialization::save_null(&null, &args.output)?;
    info!("Null distribution written to {}", args.output.display());
    for (name, min_p) in &null.min_pvalues {
        println!("{}\t{} permutations", name, min_p.len());
    }
    Ok(())
}
