//! Beneficiary priority trainer CLI
//!
//! Synthesize populations, train the scoring ensemble, analyze a trained
//! model and run paired comparisons.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pmajay_scoring_core::metrics::HIGH_PRIORITY_THRESHOLD;
use pmajay_scoring_core::{ArtifactPaths, FeatureEncoder, Model, RegionTable, ServingContext};
use pmajay_trainer::analysis::analyze;
use pmajay_trainer::cart::MAX_BINS;
use pmajay_trainer::deterministic::{GENERATOR_SEED, PARTITION_SEED, VALIDATION_FRACTION};
use pmajay_trainer::pipeline::{ENCODER_FILE, MODEL_FILE};
use pmajay_trainer::scenarios::{run_comparisons, standard_cases};
use pmajay_trainer::{
    train_pipeline, Dataset, GeneratorConfig, PipelineConfig, PopulationGenerator, TrainingParams,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "pmajay-train")]
#[command(author = "PM-AJAY Scoring Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic beneficiary priority trainer", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a labeled synthetic population
    Synthesize {
        /// Region reference table (CSV)
        #[arg(long)]
        regions: PathBuf,

        /// Output CSV path
        #[arg(short, long, default_value = "data/synthetic_beneficiaries.csv")]
        output: PathBuf,

        #[command(flatten)]
        generator: GeneratorArgs,
    },

    /// Train the scoring ensemble and write artifacts
    Train {
        /// Labeled dataset (CSV)
        #[arg(long, conflicts_with = "regions", required_unless_present = "regions")]
        data: Option<PathBuf>,

        /// Region table to synthesize a dataset from first
        #[arg(long)]
        regions: Option<PathBuf>,

        /// Output directory for model, hash, encoder and reports
        #[arg(short, long, default_value = "models")]
        out_dir: PathBuf,

        #[command(flatten)]
        generator: GeneratorArgs,

        #[command(flatten)]
        hyper: HyperArgs,
    },

    /// Evaluate trained artifacts against a labeled dataset
    Analyze {
        #[arg(long)]
        data: PathBuf,

        /// Directory holding model.json and encoder.json; reports land here too
        #[arg(short, long, default_value = "models")]
        out_dir: PathBuf,

        /// Score separating high priority from the rest
        #[arg(long, default_value_t = HIGH_PRIORITY_THRESHOLD)]
        threshold: f64,

        #[arg(long, default_value_t = PARTITION_SEED)]
        split_seed: u64,
    },

    /// Score paired what-if profiles with trained artifacts
    Compare {
        #[arg(long)]
        regions: PathBuf,

        #[arg(short, long, default_value = "models")]
        out_dir: PathBuf,
    },
}

#[derive(Args, Debug)]
struct GeneratorArgs {
    /// Number of synthetic beneficiaries
    #[arg(long, default_value_t = 10_000)]
    samples: usize,

    /// Generator seed
    #[arg(long, default_value_t = GENERATOR_SEED)]
    seed: u64,
}

impl GeneratorArgs {
    fn config(&self) -> GeneratorConfig {
        GeneratorConfig {
            num_samples: self.samples,
            seed: self.seed,
            ..GeneratorConfig::default()
        }
    }
}

#[derive(Args, Debug)]
struct HyperArgs {
    /// Number of boosting trees
    #[arg(long, default_value_t = 100)]
    trees: usize,

    /// Maximum tree depth
    #[arg(long, default_value_t = 6)]
    max_depth: usize,

    /// Minimum samples per leaf
    #[arg(long, default_value_t = 1)]
    min_samples_leaf: usize,

    /// Learning rate (fixed-point, e.g., 100000 = 0.1)
    #[arg(long, default_value_t = 100_000)]
    learning_rate: i64,

    /// L2 regularisation on leaf values
    #[arg(long, default_value_t = 1)]
    l2: i64,

    /// Maximum histogram bins per feature
    #[arg(long, default_value_t = MAX_BINS)]
    max_bins: usize,

    /// Partition seed for the validation split
    #[arg(long, default_value_t = PARTITION_SEED)]
    split_seed: u64,
}

impl HyperArgs {
    fn config(&self) -> PipelineConfig {
        PipelineConfig {
            params: TrainingParams {
                num_trees: self.trees,
                max_depth: self.max_depth,
                min_samples_leaf: self.min_samples_leaf,
                learning_rate: self.learning_rate,
                l2: self.l2,
                max_bins: self.max_bins,
            },
            validation_fraction: VALIDATION_FRACTION,
            partition_seed: self.split_seed,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Beneficiary Priority Trainer v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Synthesize {
            regions,
            output,
            generator,
        } => synthesize(regions, output, &generator),
        Command::Train {
            data,
            regions,
            out_dir,
            generator,
            hyper,
        } => train(data, regions, out_dir, &generator, &hyper),
        Command::Analyze {
            data,
            out_dir,
            threshold,
            split_seed,
        } => analyze_artifacts(data, out_dir, threshold, split_seed),
        Command::Compare { regions, out_dir } => compare(regions, out_dir),
    }
}

fn synthesize(regions: PathBuf, output: PathBuf, generator: &GeneratorArgs) -> Result<()> {
    let table = RegionTable::from_csv(&regions).context("Failed to load region table")?;
    let dataset = PopulationGenerator::new(generator.config())
        .generate(&table)
        .context("Failed to synthesize population")?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context("Failed to create output directory")?;
    }
    dataset.to_csv(&output).context("Failed to write dataset")?;
    info!("✓ Saved {} beneficiaries to {}", dataset.len(), output.display());
    Ok(())
}

fn train(
    data: Option<PathBuf>,
    regions: Option<PathBuf>,
    out_dir: PathBuf,
    generator: &GeneratorArgs,
    hyper: &HyperArgs,
) -> Result<()> {
    let dataset = match (data, regions) {
        (Some(path), _) => Dataset::from_csv(&path).context("Failed to load dataset")?,
        (None, Some(path)) => {
            let table = RegionTable::from_csv(&path).context("Failed to load region table")?;
            PopulationGenerator::new(generator.config())
                .generate(&table)
                .context("Failed to synthesize population")?
        }
        (None, None) => anyhow::bail!("either --data or --regions is required"),
    };
    info!("Loaded {} samples", dataset.len());

    let config = hyper.config();
    info!("Training configuration:");
    info!("  Trees: {}", config.params.num_trees);
    info!("  Max depth: {}", config.params.max_depth);
    info!("  Min samples per leaf: {}", config.params.min_samples_leaf);
    info!("  Learning rate: {} (fixed-point)", config.params.learning_rate);
    info!("  L2: {}", config.params.l2);

    let outcome = train_pipeline(&dataset, &config).context("Training failed")?;
    let files = outcome
        .write_artifacts(&out_dir)
        .context("Failed to write artifacts")?;

    info!("✓ Training completed successfully");
    info!("  Model: {}", files.model.display());
    info!("  Encoder: {}", files.encoder.display());
    info!("  Verdict: {}", outcome.report.generalization);
    for (name, importance) in outcome.report.feature_importances.iter().take(10) {
        info!("  {:<40} {:.4}", name, importance);
    }
    Ok(())
}

fn analyze_artifacts(data: PathBuf, out_dir: PathBuf, threshold: f64, split_seed: u64) -> Result<()> {
    let dataset = Dataset::from_csv(&data).context("Failed to load dataset")?;
    let encoder = FeatureEncoder::load_json(out_dir.join(ENCODER_FILE)).context("Failed to load encoder")?;
    let model = Model::load_json(out_dir.join(MODEL_FILE)).context("Failed to load model")?;

    let report = analyze(&dataset, &encoder, &model, VALIDATION_FRACTION, split_seed, threshold);
    for line in report.render().lines() {
        info!("{line}");
    }
    report.write(&out_dir).context("Failed to write analysis")?;
    Ok(())
}

fn compare(regions: PathBuf, out_dir: PathBuf) -> Result<()> {
    let context = ServingContext::load(&ArtifactPaths::in_dir(regions, &out_dir))
        .context("Failed to load serving artifacts")?;
    let outcomes = run_comparisons(&context, &standard_cases())?;

    let path = out_dir.join("comparisons.json");
    std::fs::write(&path, serde_json::to_string_pretty(&outcomes)?)
        .context("Failed to write comparisons")?;
    info!("✓ Comparisons written to {}", path.display());
    Ok(())
}
