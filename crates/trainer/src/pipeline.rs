//! End-to-end training: split, fit encoder, boost, evaluate, persist

use chrono::Utc;
use pmajay_scoring_core::metrics::{rmse, GeneralizationCheck, OVERFIT_GAP};
use pmajay_scoring_core::{FeatureEncoder, Model};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::dataset::{Dataset, EncodedDataset};
use crate::deterministic::{PARTITION_SEED, VALIDATION_FRACTION};
use crate::errors::Result;
use crate::trainer::{to_unit, GbdtTrainer, TrainingParams};

pub const MODEL_FILE: &str = "model.json";
pub const HASH_FILE: &str = "model.hash";
pub const ENCODER_FILE: &str = "encoder.json";
pub const IMPORTANCE_FILE: &str = "feature_importances.csv";
pub const METRICS_FILE: &str = "training_metrics.txt";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub params: TrainingParams,
    pub validation_fraction: f64,
    pub partition_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            params: TrainingParams::default(),
            validation_fraction: VALIDATION_FRACTION,
            partition_seed: PARTITION_SEED,
        }
    }
}

/// Quality summary of one training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub train_rmse: f64,
    pub validation_rmse: f64,
    pub generalization: GeneralizationCheck,
    /// Normalised gain importances, largest first
    pub feature_importances: Vec<(String, f64)>,
    pub model_hash: String,
    pub train_samples: usize,
    pub validation_samples: usize,
}

impl TrainingReport {
    /// Text written to `training_metrics.txt`
    pub fn metrics_text(&self) -> String {
        format!(
            "Train RMSE: {:.4}\nValidation RMSE: {:.4}\n",
            self.train_rmse, self.validation_rmse
        )
    }
}

/// Everything a training run produces
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub encoder: FeatureEncoder,
    pub model: Model,
    pub report: TrainingReport,
}

/// Paths written by [`TrainingOutcome::write_artifacts`]
#[derive(Debug, Clone)]
pub struct ArtifactFiles {
    pub model: PathBuf,
    pub hash: PathBuf,
    pub encoder: PathBuf,
    pub importances: PathBuf,
    pub metrics: PathBuf,
}

fn predict_all(model: &Model, data: &EncodedDataset) -> Vec<f64> {
    data.features.iter().map(|row| model.predict_unit(row)).collect()
}

fn unit_targets(data: &EncodedDataset) -> Vec<f64> {
    data.targets.iter().map(|&t| to_unit(t)).collect()
}

/// Split, fit the encoder on the training rows only, boost and evaluate
///
/// Never fails on quality grounds; a large validation gap is logged only.
pub fn train_pipeline(dataset: &Dataset, config: &PipelineConfig) -> Result<TrainingOutcome> {
    let (train, validation) = dataset.split(config.validation_fraction, config.partition_seed);
    info!(
        train = train.len(),
        validation = validation.len(),
        seed = config.partition_seed,
        "Split dataset"
    );

    let encoder = FeatureEncoder::fit(&train.records)?;
    let train_encoded = train.encode(&encoder);
    let validation_encoded = validation.encode(&encoder);

    let trained = GbdtTrainer::new(config.params.clone()).train(&train_encoded)?;
    let model = trained.model.clone();

    let train_rmse = rmse(&unit_targets(&train_encoded), &predict_all(&model, &train_encoded));
    let validation_rmse = rmse(
        &unit_targets(&validation_encoded),
        &predict_all(&model, &validation_encoded),
    );
    let generalization = GeneralizationCheck::from_rmse(train_rmse, validation_rmse);

    info!("Train RMSE: {train_rmse:.4}");
    info!("Validation RMSE: {validation_rmse:.4}");
    if validation_rmse - train_rmse > OVERFIT_GAP {
        warn!(
            gap = validation_rmse - train_rmse,
            "Validation error well above train error; model may be overfitting"
        );
    }

    let report = TrainingReport {
        train_rmse,
        validation_rmse,
        generalization,
        feature_importances: trained.feature_importances(&encoder.feature_names()),
        model_hash: model.hash_hex()?,
        train_samples: train.len(),
        validation_samples: validation.len(),
    };

    Ok(TrainingOutcome {
        encoder,
        model,
        report,
    })
}

impl TrainingOutcome {
    /// Persist model, hash, encoder, importances and metrics into `dir`
    pub fn write_artifacts<P: AsRef<Path>>(&self, dir: P) -> Result<ArtifactFiles> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let files = ArtifactFiles {
            model: dir.join(MODEL_FILE),
            hash: dir.join(HASH_FILE),
            encoder: dir.join(ENCODER_FILE),
            importances: dir.join(IMPORTANCE_FILE),
            metrics: dir.join(METRICS_FILE),
        };

        info!("Saving model to: {}", files.model.display());
        let digest = self.model.save_json(&files.model)?;
        fs::write(&files.hash, &digest)?;

        self.encoder.save_json(&files.encoder)?;

        let mut csv = csv::Writer::from_path(&files.importances)?;
        csv.write_record(["Feature", "Importance"])?;
        for (name, importance) in &self.report.feature_importances {
            let value = format!("{importance:.6}");
            csv.write_record([name.as_str(), value.as_str()])?;
        }
        csv.flush()?;

        let metrics = format!(
            "{}Model hash: {}\nTrained at: {}\n",
            self.report.metrics_text(),
            digest,
            Utc::now().to_rfc3339()
        );
        fs::write(&files.metrics, metrics)?;

        info!("  Hash: {} ({})", files.hash.display(), digest);
        Ok(files)
    }
}
