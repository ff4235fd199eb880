//! QTL search.
//!
//! remim run --data data.bin --output results.json --pheno-col T1 --w-size 15 --null null.bin

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use remim_core::model::serialization;
use remim_core::result::fit_qtl_model;
use remim_core::{RemimConfig, RemimEngine};

#[derive(Args)]
pub struct RunArgs {
    /// Prepared data object (.json or binary)
    #[arg(long)]
    data: PathBuf,

    /// Output file; `.json` writes JSON, anything else binary
    #[arg(long)]
    output: PathBuf,

    /// Trait names to analyse (comma-separated); all traits if omitted
    #[arg(long, value_delimiter = ',')]
    pheno_col: Option<Vec<String>>,

    /// Exclusion window around each QTL, in cM
    #[arg(long, default_value = "15")]
    w_size: f64,

    /// Forward-search significance level
    #[arg(long, default_value = "0.01")]
    sig_fwd: f64,

    /// Backward-elimination significance level
    #[arg(long, default_value = "0.0001")]
    sig_bwd: f64,

    /// Support-interval drop in -log10(p)
    #[arg(long, default_value = "1.5", conflicts_with = "no_sint")]
    d_sint: f64,

    /// Skip support intervals
    #[arg(long, default_value = "false")]
    no_sint: bool,

    /// Use one averaged polygenic background instead of one component per QTL
    #[arg(long, default_value = "false")]
    polygenes: bool,

    /// Maximum number of search rounds
    #[arg(long)]
    n_rounds: Option<usize>,

    /// Permutation null distribution; significance levels become quantiles of it
    #[arg(long)]
    null: Option<PathBuf>,

    /// Fit a final variance-component model of the accepted QTL
    #[arg(long, default_value = "false")]
    fit_model: bool,
}

pub fn run(args: RunArgs, threads: Option<usize>) -> Result<()> {
    info!("=== REMIM search ===");
    info!("Data: {}", args.data.display());

    let data = serialization::load_data(&args.data)?;
    info!(
        "Loaded {} individuals, {} positions on {} linkage group(s), {} trait(s)",
        data.phenotypes.n_individuals(),
        data.genome.n_positions(),
        data.genome.n_groups(),
        data.phenotypes.n_traits()
    );

    let null = args
        .null
        .as_deref()
        .map(serialization::load_null)
        .transpose()?;
    if let Some(null) = &null {
        info!("Null distribution: {} permutations", null.n_perm);
    }

    let config = RemimConfig {
        w_size: args.w_size,
        sig_fwd: args.sig_fwd,
        sig_bwd: args.sig_bwd,
        d_sint: (!args.no_sint).then_some(args.d_sint),
        polygenes: args.polygenes,
        n_rounds: args.n_rounds,
        n_clusters: threads,
    };
    let engine = RemimEngine::new(config)?;
    let mut output = engine.run(&data, args.pheno_col.as_deref(), null.as_ref())?;

    for result in output.traits.iter_mut() {
        info!(
            "Trait {}: {} QTL after {} round(s)\n{}",
            result.pheno_col,
            result.qtls.len(),
            result.rounds,
            result.qtls.sorted_by_genome()
        );
        if !args.fit_model {
            continue;
        }
        let col = data
            .phenotypes
            .trait_index(&result.pheno_col)
            .with_context(|| format!("Trait {} missing from data", result.pheno_col))?;
        let response = data.phenotypes.response(col)?;
        let kinship = data.kinship.subset(&response.individuals)?;
        match fit_qtl_model(engine.fitter(), &response, &kinship, result) {
            Ok(fit) => {
                info!(
                    "Trait {}: h2 = {:.3}, sigma2_e = {:.4} ({:?})",
                    result.pheno_col, fit.h2, fit.sigma2_e, fit.status
                );
                result.model_fit = Some(fit);
            }
            Err(e) => warn!("Trait {}: QTL model fit failed: {}", result.pheno_col, e),
        }
    }
    for failure in &output.failures {
        warn!("Trait {} failed: {}", failure.pheno_col, failure.error);
    }

    serialization::save_output(&output, &args.output)?;
    info!("Results written to {}", args.output.display());

    println!(
        "{} trait(s) analysed, {} failed",
        output.traits.len(),
        output.failures.len()
    );
    for result in &output.traits {
        println!("## {}", result.pheno_col);
        print!("{}", result.qtls.sorted_by_genome());
    }

    Ok(())
}
