//! Scoring ensemble with integer-only inference
//!
//! - Canonical JSON serialization
//! - BLAKE3 model hashing
//! - Fixed-point evaluation, converted to a unit score only at the edge

use super::tree::Tree;
use crate::errors::{InputKind, Result, ScoringError};
use crate::serde_canon::{canonical_digest_hex, read_artifact, write_canonical};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Fixed-point scale shared by features, thresholds, leaves and scores (1e6)
pub const SCALE: i64 = 1_000_000;

/// Current model format version
pub const MODEL_VERSION: i32 = 1;

/// Gradient-boosted regression ensemble
///
/// `score = bias + Σ leaf(tree) * tree.weight / scale`, all in fixed point.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub version: i32,

    /// Fixed-point scale factor
    pub scale: i64,

    pub trees: Vec<Tree>,

    /// Initial prediction (mean training target, fixed-point)
    pub bias: i64,

    /// Scale of the value returned by `score`
    pub post_scale: i64,

    /// Width of the encoded feature vector the trees index into
    #[serde(default)]
    pub feature_count: usize,
}

impl Model {
    pub fn new(trees: Vec<Tree>, bias: i64) -> Self {
        Self {
            version: MODEL_VERSION,
            scale: SCALE,
            trees,
            bias,
            post_scale: SCALE,
            feature_count: 0,
        }
    }

    /// Record the encoded width the model was trained on
    pub fn with_feature_count(mut self, feature_count: usize) -> Self {
        self.feature_count = feature_count;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.version != MODEL_VERSION {
            return Err(ScoringError::ValidationFailed(format!(
                "Unsupported model version: {}",
                self.version
            )));
        }
        if self.scale <= 0 || self.post_scale <= 0 {
            return Err(ScoringError::ValidationFailed(format!(
                "Invalid scale {} / post_scale {}",
                self.scale, self.post_scale
            )));
        }

        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate().map_err(|e| {
                ScoringError::ValidationFailed(format!("Tree {i} validation failed: {e}"))
            })?;

            if self.feature_count > 0 {
                let out_of_range = tree
                    .nodes
                    .iter()
                    .any(|n| !n.is_leaf() && n.feature_idx as usize >= self.feature_count);
                if out_of_range {
                    return Err(ScoringError::ValidationFailed(format!(
                        "Tree {i} splits on a feature beyond width {}",
                        self.feature_count
                    )));
                }
            }
        }

        Ok(())
    }

    /// Contribution of one tree at its reached leaf, after shrinkage
    pub fn tree_output(&self, tree: &Tree, leaf_value: i64) -> i64 {
        let weighted = leaf_value as i128 * tree.weight as i128 / self.scale as i128;
        weighted.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    /// Deterministic fixed-point inference
    pub fn score(&self, features: &[i64]) -> i64 {
        self.trees.iter().fold(self.bias, |sum, tree| {
            sum.saturating_add(self.tree_output(tree, tree.evaluate(features)))
        })
    }

    /// Raw prediction as a float, before clipping
    pub fn predict_raw(&self, features: &[i64]) -> f64 {
        self.score(features) as f64 / self.post_scale as f64
    }

    /// Prediction clipped to the unit interval
    pub fn predict_unit(&self, features: &[i64]) -> f64 {
        self.predict_raw(features).clamp(0.0, 1.0)
    }

    pub fn hash_hex(&self) -> Result<String> {
        Ok(canonical_digest_hex(self)?)
    }

    /// Save as canonical JSON, returning the BLAKE3 digest of the file
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        write_canonical(self, path)
    }

    /// Load and validate a model file
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let model: Model = read_artifact(path, InputKind::Model)?;
        model.validate()?;
        Ok(model)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}
