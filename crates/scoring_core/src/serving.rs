//! Read-only serving context
//!
//! Bundles the region table, fitted encoder and model loaded once at
//! startup. Every operation takes `&self`, so a single context can be
//! shared across concurrent requests without locking.

use std::path::PathBuf;
use tracing::{debug, info};

use crate::beneficiary::{BeneficiaryDefaults, BeneficiaryInput, BeneficiaryRecord};
use crate::encoder::FeatureEncoder;
use crate::errors::{Result, ScoringError};
use crate::explain::{attribute, FeatureContribution, TOP_FACTORS};
use crate::gbdt::Model;
use crate::region::RegionTable;

/// Locations of the three inputs needed to serve
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub region_table: PathBuf,
    pub model: PathBuf,
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    /// Conventional layout: `model.json` and `encoder.json` inside `dir`
    pub fn in_dir(region_table: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            region_table: region_table.into(),
            model: dir.join("model.json"),
            encoder: dir.join("encoder.json"),
        }
    }
}

/// Score for one request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Clipped model output in [0, 1]
    pub score: f64,
    /// `round(score * 100)`
    pub display_score: u8,
}

impl Prediction {
    fn from_unit(score: f64) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            score,
            display_score: (score * 100.0).round() as u8,
        }
    }

    /// `Priority Score: N/100`
    pub fn label(&self) -> String {
        format!("Priority Score: {}/100", self.display_score)
    }
}

/// Score plus its ranked attribution
#[derive(Debug, Clone, PartialEq)]
pub struct Explanation {
    pub prediction: Prediction,
    /// Top factors by magnitude, largest first
    pub factors: Vec<FeatureContribution>,
    /// Expected model output the contributions are measured against
    pub baseline: f64,
}

#[derive(Debug, Clone)]
pub struct ServingContext {
    regions: RegionTable,
    encoder: FeatureEncoder,
    model: Model,
    defaults: BeneficiaryDefaults,
    model_hash: String,
}

impl ServingContext {
    /// Pair a model with its encoder
    ///
    /// A model without a recorded width adopts the encoder's, and every split
    /// must then index inside it.
    pub fn new(regions: RegionTable, encoder: FeatureEncoder, mut model: Model) -> Result<Self> {
        let width = encoder.feature_count();
        let model_hash = model.hash_hex()?;
        if model.feature_count == 0 {
            model.feature_count = width;
            model.validate().map_err(|e| {
                ScoringError::FeatureMismatch(format!("model does not fit encoder width {width}: {e}"))
            })?;
        } else if model.feature_count != width {
            return Err(ScoringError::FeatureMismatch(format!(
                "model expects {} features, encoder produces {}",
                model.feature_count, width
            )));
        }
        Ok(Self {
            regions,
            encoder,
            model,
            defaults: BeneficiaryDefaults::default(),
            model_hash,
        })
    }

    /// Load all three inputs from disk
    pub fn load(paths: &ArtifactPaths) -> Result<Self> {
        let regions = RegionTable::from_csv(&paths.region_table)?;
        let encoder = FeatureEncoder::load_json(&paths.encoder)?;
        let model = Model::load_json(&paths.model)?;
        let context = Self::new(regions, encoder, model)?;
        info!(
            regions = context.regions.len(),
            features = context.encoder.feature_count(),
            trees = context.model.num_trees(),
            hash = %context.model_hash,
            "Serving context ready"
        );
        Ok(context)
    }

    /// Replace the fallback values for omitted personal fields
    pub fn with_defaults(mut self, defaults: BeneficiaryDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Merged record the model will see for `input`
    pub fn resolve(&self, input: &BeneficiaryInput) -> BeneficiaryRecord {
        input.resolve(&self.regions, &self.defaults)
    }

    fn encode(&self, input: &BeneficiaryInput) -> Result<Vec<i64>> {
        if input.region.trim().is_empty() {
            return Err(ScoringError::InvalidParameters(
                "region must not be empty".to_string(),
            ));
        }
        let record = self.resolve(input);
        let features = self.encoder.transform(&record);
        if features.len() != self.model.feature_count {
            return Err(ScoringError::FeatureMismatch(format!(
                "encoded {} features, model expects {}",
                features.len(),
                self.model.feature_count
            )));
        }
        Ok(features)
    }

    pub fn predict(&self, input: &BeneficiaryInput) -> Result<Prediction> {
        let features = self.encode(input)?;
        let prediction = Prediction::from_unit(self.model.predict_unit(&features));
        debug!(region = input.region.as_str(), score = prediction.score, "Scored request");
        Ok(prediction)
    }

    pub fn explain(&self, input: &BeneficiaryInput) -> Result<Explanation> {
        let features = self.encode(input)?;
        let prediction = Prediction::from_unit(self.model.predict_unit(&features));
        let attribution = attribute(&self.model, &features, &self.encoder.feature_names());
        Ok(Explanation {
            prediction,
            factors: attribution.top(TOP_FACTORS),
            baseline: attribution.baseline,
        })
    }

    pub fn regions(&self) -> &RegionTable {
        &self.regions
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// BLAKE3 digest of the model's canonical JSON
    pub fn model_hash(&self) -> &str {
        &self.model_hash
    }
}
