//! Leave-one-out evaluation runner.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use essence_core::{Averaging, Classifier, ClassifierConfig, IndexMode};
use essence_eval::{LeaveOneOut, WordVectorModel, load_training_set};

/// Evaluate the phrase classifier under a leave-one-out protocol.
#[derive(Debug, Parser)]
#[command(name = "evaluate", version, about)]
struct Args {
    /// Training set: TSV of `phrase`, `subtopic`, `frequency` rows.
    #[arg(long)]
    train: PathBuf,

    /// Word-vector model artifact (JSON).
    #[arg(long)]
    model: PathBuf,

    /// Confidence limit in [0, 1]; converts to distance threshold 1 - limit.
    #[arg(long, default_value_t = 0.9)]
    limit: f32,

    /// Averaging mode for per-fold metrics.
    #[arg(long, default_value = "samples")]
    averaging: Averaging,

    /// Directory for the output tables.
    #[arg(long, default_value = "data/models")]
    out: PathBuf,

    /// Embedding cache file; omit to keep the cache in memory only.
    #[arg(long)]
    cache: Option<PathBuf>,
}

fn run(args: Args) -> anyhow::Result<()> {
    let model = WordVectorModel::load(&args.model)?;

    let mut config = ClassifierConfig::new()
        .with_dimension(model.dimension())
        .with_index_mode(IndexMode::Rebuild);
    if let Some(cache) = &args.cache {
        config = config.with_cache_path(cache);
    }
    let mut classifier = Classifier::new(Box::new(model), config)?;

    let training = load_training_set(&args.train)?;
    let mut harness = LeaveOneOut::new(training);

    let started = Instant::now();
    harness.run(&mut classifier, args.limit, args.averaging)?;
    harness.write_tables(&args.out, args.limit)?;

    println!(
        "Evaluated {} folds in {:.2?} (tables in {})",
        harness.metrics().len(),
        started.elapsed(),
        args.out.display()
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("Evaluation failed: {e:#}");
        std::process::exit(1);
    }
}
