//! Beneficiary priority trainer
//!
//! Synthesizes a labeled population from a region table and trains the
//! integer GBDT ensemble with full determinism: the same seeds and region
//! table always yield byte-identical datasets and model files.

pub mod analysis;
pub mod cart;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod pipeline;
pub mod scenarios;
pub mod synth;
pub mod trainer;

use pmajay_scoring_core::RegionTable;
use std::path::Path;

pub use dataset::{Dataset, EncodedDataset};
pub use deterministic::{partition_indices, seeded_rng, SplitTieBreaker};
pub use errors::TrainerError;
pub use pipeline::{train_pipeline, PipelineConfig, TrainingOutcome, TrainingReport};
pub use synth::{GeneratorConfig, PopulationGenerator};
pub use trainer::{GbdtTrainer, TrainingParams};

/// Synthesize from a region table file and train in one step
pub fn train_from_regions(
    regions_path: &Path,
    generator: GeneratorConfig,
    config: &PipelineConfig,
) -> Result<TrainingOutcome, TrainerError> {
    let regions = RegionTable::from_csv(regions_path)?;
    let dataset = PopulationGenerator::new(generator).generate(&regions)?;
    train_pipeline(&dataset, config)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
