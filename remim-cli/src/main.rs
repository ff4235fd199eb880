//! remim: random-effect multiple interval mapping of QTL in polyploids.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "remim",
    version,
    about = "REMIM-RS: multiple QTL mapping in polyploids with variance component score tests",
    long_about = "Forward search, backward elimination and support intervals for QTL\n\
                   on a prepared data object of per-position kinship matrices."
)]
struct Cli {
    /// Number of worker threads; defaults to one per core
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search QTL for one or more traits
    Run(commands::run::RunArgs),

    /// Build a permutation null distribution of genome-wide minimum p-values
    Permute(commands::permute::PermuteArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    tracing::info!("REMIM-RS v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.threads),
        Commands::Permute(args) => commands::permute::run(args, cli.threads),
    }
}
