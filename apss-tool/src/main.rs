//! APSS Tool - CLI for all-pairs similarity search
//!
//! # Overview
//!
//! Reads enumerated feature vectors from TSV files, compares every vector of
//! one file with every vector of another (or the same) file, and writes the
//! weighted pairs that pass the configured filters.
//!
//! # Commands
//!
//! - `allpairs` - Run a similarity search between two vector files
//! - `measures` - List the available similarity measures and weightings
//!
//! # Examples
//!
//! ## Cosine similarity of a file against itself, keeping strong pairs
//! ```bash
//! apss-tool allpairs -a vectors.tsv -o pairs.tsv -m cosine --min-similarity 0.5
//! ```
//!
//! ## Skew divergence over t-test weighted vectors
//! ```bash
//! apss-tool allpairs -a vectors.tsv -o pairs.tsv -m lee --lee-alpha 0.9 -w ttest
//! ```
//!
//! ## Run from a JSON config with a single worker
//! ```bash
//! apss-tool allpairs -a entries.tsv -b other.tsv -o pairs.tsv -c run.json -t 1
//! ```

mod allpairs;
mod tsv;

use anyhow::Result;
use clap::{Parser, Subcommand};

use allpairs::{AllpairsArgs, check_args, list_measures, run_allpairs};

#[derive(Parser)]
#[command(name = "apss-tool")]
#[command(version, about = "CLI for all-pairs similarity search over sparse vectors")]
#[command(after_help = "Use 'apss-tool <command> --help' for more information.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare every vector of input-a with every vector of input-b
    Allpairs(AllpairsArgs),

    /// List similarity measures and weightings
    Measures,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("apss_tool=info".parse()?)
                .add_directive("apss_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Allpairs(args) => {
            check_args(&args)?;
            run_allpairs(&args)?;
        }
        Commands::Measures => {
            list_measures()?;
        }
    }

    Ok(())
}
