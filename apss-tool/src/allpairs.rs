//! The `allpairs` command: TSV vectors in, weighted pairs out

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Args, ValueEnum};
use tracing::{info, warn};

use apss_core::measure::{self, weighting};
use apss_core::{
    ApssConfig, ApssStats, FeatureMarginals, InnerEngine, MeasureParams, ObjectSink,
    ProgressEvent, StatsSnapshot, TaskState,
};

use crate::tsv::{TsvPairSink, TsvVectorSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    Naive,
    Inverted,
}

impl From<Algorithm> for InnerEngine {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Naive => InnerEngine::Naive,
            Algorithm::Inverted => InnerEngine::Inverted,
        }
    }
}

#[derive(Debug, Args)]
pub struct AllpairsArgs {
    /// Vector file for the outer side (TSV: entry, then feature/weight pairs)
    #[arg(short = 'a', long = "input-a")]
    pub input_a: PathBuf,

    /// Vector file for the inner side (default: compare input-a with itself)
    #[arg(short = 'b', long = "input-b")]
    pub input_b: Option<PathBuf>,

    /// Output file for weighted pairs
    #[arg(short, long)]
    pub output: PathBuf,

    /// JSON run configuration; command-line flags override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Similarity measure (see the `measures` command)
    #[arg(short, long)]
    pub measure: Option<String>,

    /// Swap the operands of the measure
    #[arg(long, default_value = "false")]
    pub reversed: bool,

    /// Lp-space exponent for the `lp` measure
    #[arg(long)]
    pub lp_power: Option<f64>,

    /// Weeds precision/recall balance
    #[arg(long)]
    pub weeds_beta: Option<f64>,

    /// Weeds harmonic/arithmetic balance
    #[arg(long)]
    pub weeds_gamma: Option<f64>,

    /// Mixture weight of input-a for the `lee` measure, in (0, 1)
    #[arg(long)]
    pub lee_alpha: Option<f64>,

    /// Mixture weight of input-a for the `lambda` measure, in (0, 1)
    #[arg(long)]
    pub lambda: Option<f64>,

    /// Smallest dimensionality assumed by the `kl` and `tau` measures
    #[arg(long)]
    pub min_cardinality: Option<usize>,

    /// Feature weighting applied before measuring (see the `measures` command)
    #[arg(short, long)]
    pub weighting: Option<String>,

    /// Factor for the `constant` weighting
    #[arg(long)]
    pub weighting_factor: Option<f64>,

    /// Keep pairs with at least this similarity
    #[arg(long)]
    pub min_similarity: Option<f64>,

    /// Keep pairs with at most this similarity
    #[arg(long)]
    pub max_similarity: Option<f64>,

    /// Also write pairs relating an entry to itself
    #[arg(long, default_value = "false")]
    pub identity_pairs: bool,

    /// Skip vectors with fewer features
    #[arg(long)]
    pub min_entries: Option<usize>,

    /// Comparison algorithm
    #[arg(long, value_enum)]
    pub algorithm: Option<Algorithm>,

    /// Run in the calling thread without chunking
    #[arg(long, default_value = "false")]
    pub single_threaded: bool,

    /// Worker threads (default: number of CPUs + 1)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Maximum vectors per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Memory available for chunks, in bytes
    #[arg(long)]
    pub memory_budget: Option<u64>,

    /// Write the final counters as JSON to this file
    #[arg(long)]
    pub stats_json: Option<PathBuf>,
}

impl AllpairsArgs {
    /// Overlay command-line flags onto a base configuration
    pub fn apply(&self, config: &mut ApssConfig) {
        if let Some(measure) = &self.measure {
            config.measure = measure.clone();
        }
        if self.reversed {
            config.measure_reversed = true;
        }
        if let Some(p) = self.lp_power {
            config.measure_params.lp_power = p;
        }
        if let Some(beta) = self.weeds_beta {
            config.measure_params.weeds_beta = beta;
        }
        if let Some(gamma) = self.weeds_gamma {
            config.measure_params.weeds_gamma = gamma;
        }
        if let Some(alpha) = self.lee_alpha {
            config.measure_params.lee_alpha = alpha;
        }
        if let Some(lambda) = self.lambda {
            config.measure_params.lambda = lambda;
        }
        if let Some(n) = self.min_cardinality {
            config.measure_params.min_cardinality = n;
        }
        if let Some(weighting) = &self.weighting {
            config.weighting = weighting.clone();
        }
        if let Some(factor) = self.weighting_factor {
            config.measure_params.weighting_factor = factor;
        }
        if self.min_similarity.is_some() {
            config.min_similarity = self.min_similarity;
        }
        if self.max_similarity.is_some() {
            config.max_similarity = self.max_similarity;
        }
        if self.identity_pairs {
            config.output_identity_pairs = true;
        }
        if let Some(n) = self.min_entries {
            config.min_entries = n;
        }
        if let Some(algorithm) = self.algorithm {
            config.algorithm = algorithm.into();
        }
        if self.single_threaded {
            config.threaded = false;
        }
        if let Some(n) = self.threads {
            config.num_threads = n;
        }
        if let Some(n) = self.chunk_size {
            config.max_chunk_size = n;
        }
        if self.memory_budget.is_some() {
            config.memory_budget_bytes = self.memory_budget;
        }
    }
}

/// Read a JSON configuration, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> Result<ApssConfig> {
    let Some(path) = path else {
        return Ok(ApssConfig::default());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    Ok(config)
}

/// Log progress at state changes and every tenth of the run
fn progress_logger() -> impl Fn(&ProgressEvent) + Send + Sync {
    let last_decile = AtomicU64::new(u64::MAX);
    move |event: &ProgressEvent| {
        let decile = (event.percent / 10.0) as u64;
        if event.state != TaskState::Running || last_decile.swap(decile, Ordering::Relaxed) != decile
        {
            info!("[progress] {}", event);
        }
    }
}

pub fn run_allpairs(args: &AllpairsArgs) -> Result<StatsSnapshot> {
    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let input_b = args.input_b.as_ref().unwrap_or(&args.input_a);
    if input_b == &args.input_a {
        info!("Comparing {} with itself", args.input_a.display());
    }

    let source_a = TsvVectorSource::open(&args.input_a)
        .with_context(|| format!("Failed to open {}", args.input_a.display()))?;
    let source_b = TsvVectorSource::open(input_b)
        .with_context(|| format!("Failed to open {}", input_b.display()))?;
    let sink = Arc::new(
        TsvPairSink::create(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?,
    );
    let stats = Arc::new(ApssStats::new());

    let mut task = config
        .build(source_a, source_b, sink.clone(), Arc::clone(&stats))
        .context("Failed to set up the run")?;
    task.progress().add_listener(Arc::new(progress_logger()));

    let start = Instant::now();
    task.execute().context("All-pairs run failed")?;
    sink.flush()
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    let snapshot = stats.snapshot();

    info!(
        "Finished in {:.2?}: {}",
        start.elapsed(),
        snapshot
    );
    if snapshot.productions == 0 {
        warn!("No pairs passed the filters");
    }

    if let Some(path) = &args.stats_json {
        let json = serde_json::to_string_pretty(&snapshot)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write stats {}", path.display()))?;
    }

    Ok(snapshot)
}

/// Print the accepted measure and weighting names
pub fn list_measures() -> Result<()> {
    let params = MeasureParams::default();
    // Stand-in marginals so that corpus-dependent measures resolve
    let marginals = Arc::new(FeatureMarginals::default());
    for name in measure::MEASURE_NAMES {
        let proximity = measure::by_name_in(name, &params, Some(&marginals))?;
        let kind = if proximity.is_decomposable() {
            "decomposable"
        } else {
            "direct"
        };
        let order = if proximity.is_commutative() {
            "commutative"
        } else {
            "non-commutative"
        };
        let corpus = if measure::needs_marginals(name) {
            " (reads corpus marginals)"
        } else {
            ""
        };
        println!("{:<16} {:<14} {}{}", name, kind, order, corpus);
    }

    println!();
    println!("Weightings:");
    for name in weighting::WEIGHTING_NAMES {
        let corpus = if weighting::needs_marginals(name) {
            " (reads corpus marginals)"
        } else {
            ""
        };
        println!("{:<16}{}", name, corpus);
    }
    Ok(())
}

/// Reject argument combinations clap cannot express
pub fn check_args(args: &AllpairsArgs) -> Result<()> {
    if args.single_threaded && (args.threads.is_some() || args.chunk_size.is_some()) {
        bail!("--threads and --chunk-size have no effect with --single-threaded");
    }
    if args.output == args.input_a || args.input_b.as_ref() == Some(&args.output) {
        bail!("output file must differ from the inputs");
    }
    Ok(())
}
