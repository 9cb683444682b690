//! Squared-error boosting over the encoded population
//!
//! Every tree is fitted to the residual gradients of the current ensemble in
//! fixed point, so a fixed dataset and parameter set always yields the same
//! model bytes.

use pmajay_scoring_core::gbdt::{Model, SCALE};
use tracing::{debug, info};

use crate::cart::{BinnedFeatures, CartBuilder, TreeConfig, MAX_BINS};
use crate::dataset::EncodedDataset;
use crate::errors::{Result, TrainerError};

/// Boosting hyperparameters
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingParams {
    pub num_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Shrinkage per tree at fixed-point scale (100_000 = 0.1)
    pub learning_rate: i64,
    pub l2: i64,
    pub max_bins: usize,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            num_trees: 100,
            max_depth: 6,
            min_samples_leaf: 1,
            learning_rate: 100_000,
            l2: 1,
            max_bins: MAX_BINS,
        }
    }
}

/// Fitted ensemble plus the split gain accumulated per feature
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub model: Model,
    pub feature_gain: Vec<f64>,
}

impl TrainedModel {
    /// Gain-based importances normalised to sum to 1, largest first
    pub fn feature_importances(&self, names: &[String]) -> Vec<(String, f64)> {
        let total: f64 = self.feature_gain.iter().sum();
        let mut importances: Vec<(String, f64)> = names
            .iter()
            .zip(&self.feature_gain)
            .map(|(name, &gain)| {
                let share = if total > 0.0 { gain / total } else { 0.0 };
                (name.clone(), share)
            })
            .collect();
        importances.sort_by(|a, b| b.1.total_cmp(&a.1));
        importances
    }
}

pub struct GbdtTrainer {
    params: TrainingParams,
}

impl GbdtTrainer {
    pub fn new(params: TrainingParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &TrainingParams {
        &self.params
    }

    /// Fit the ensemble; fails only on empty input or degenerate parameters
    pub fn train(&self, dataset: &EncodedDataset) -> Result<TrainedModel> {
        if dataset.is_empty() {
            return Err(TrainerError::Training("cannot train on zero rows".to_string()));
        }
        if self.params.learning_rate <= 0 || self.params.num_trees == 0 {
            return Err(TrainerError::Training(format!(
                "invalid parameters: {} trees at learning rate {}",
                self.params.num_trees, self.params.learning_rate
            )));
        }

        let n_samples = dataset.len();
        let bias = self.calculate_bias(&dataset.targets);
        let mut model = Model::new(Vec::with_capacity(self.params.num_trees), bias)
            .with_feature_count(dataset.feature_count);
        let mut predictions = vec![bias; n_samples];

        let binned = BinnedFeatures::new(&dataset.features, dataset.feature_count, self.params.max_bins);
        let tree_config = TreeConfig {
            max_depth: self.params.max_depth,
            min_samples_leaf: self.params.min_samples_leaf,
            l2: self.params.l2,
        };
        info!(
            samples = n_samples,
            features = dataset.feature_count,
            trees = self.params.num_trees,
            "Training GBDT ensemble"
        );

        let mut feature_gain = vec![0.0; dataset.feature_count];
        for tree_idx in 0..self.params.num_trees {
            let gradients = self.calculate_gradients(&dataset.targets, &predictions);

            let grown = CartBuilder::new(&binned, &gradients, tree_config.clone())
                .build(self.params.learning_rate);

            // Update predictions with the shrunk tree output
            for (pred, row) in predictions.iter_mut().zip(&dataset.features) {
                let leaf = grown.tree.evaluate(row);
                *pred = pred.saturating_add(model.tree_output(&grown.tree, leaf));
            }

            for (total, gain) in feature_gain.iter_mut().zip(&grown.feature_gain) {
                *total += gain;
            }
            debug!(
                "Tree {}/{}: {} leaves",
                tree_idx + 1,
                self.params.num_trees,
                grown.tree.leaf_count()
            );
            model.trees.push(grown.tree);
        }

        model.validate()?;
        Ok(TrainedModel {
            model,
            feature_gain,
        })
    }

    /// Mean target, the prediction before any tree
    fn calculate_bias(&self, targets: &[i64]) -> i64 {
        if targets.is_empty() {
            return 0;
        }
        let sum: i128 = targets.iter().map(|&t| t as i128).sum();
        (sum / targets.len() as i128) as i64
    }

    /// Squared-error gradient: prediction - target (hessian is 1 per row)
    fn calculate_gradients(&self, targets: &[i64], predictions: &[i64]) -> Vec<i64> {
        predictions
            .iter()
            .zip(targets)
            .map(|(&p, &t)| p.saturating_sub(t))
            .collect()
    }
}

/// Fixed-point score back to a float
pub fn to_unit(score: i64) -> f64 {
    score as f64 / SCALE as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_simple_dataset() -> EncodedDataset {
        EncodedDataset {
            features: vec![
                vec![100_000, 200_000],
                vec![200_000, 300_000],
                vec![300_000, 400_000],
                vec![400_000, 500_000],
            ],
            targets: vec![100_000, 200_000, 300_000, 400_000],
            feature_count: 2,
        }
    }

    fn params(num_trees: usize) -> TrainingParams {
        TrainingParams {
            num_trees,
            max_depth: 2,
            ..TrainingParams::default()
        }
    }

    #[test]
    fn test_train_simple_model() -> Result<()> {
        let trained = GbdtTrainer::new(params(4)).train(&create_simple_dataset())?;

        assert_eq!(trained.model.trees.len(), 4);
        assert_eq!(trained.model.feature_count, 2);
        assert_eq!(trained.model.scale, SCALE);
        assert!(trained.model.trees.iter().all(|t| t.weight == 100_000));
        Ok(())
    }

    #[test]
    fn test_bias_calculation() {
        let trainer = GbdtTrainer::new(TrainingParams::default());
        assert_eq!(trainer.calculate_bias(&[1_000_000, 2_000_000, 3_000_000]), 2_000_000);
    }

    #[test]
    fn test_boosting_reduces_error() -> Result<()> {
        let dataset = create_simple_dataset();
        let few = GbdtTrainer::new(params(1)).train(&dataset)?.model;
        let many = GbdtTrainer::new(params(50)).train(&dataset)?.model;

        let sse = |m: &Model| -> f64 {
            dataset
                .features
                .iter()
                .zip(&dataset.targets)
                .map(|(row, &t)| (m.predict_raw(row) - to_unit(t)).powi(2))
                .sum()
        };
        assert!(sse(&many) < sse(&few));
        Ok(())
    }

    #[test]
    fn test_determinism() -> Result<()> {
        let dataset = create_simple_dataset();
        let a = GbdtTrainer::new(params(8)).train(&dataset)?.model;
        let b = GbdtTrainer::new(params(8)).train(&dataset)?.model;
        assert_eq!(a, b);
        assert_eq!(a.hash_hex()?, b.hash_hex()?);
        Ok(())
    }

    #[test]
    fn test_importances_normalised() -> Result<()> {
        let trained = GbdtTrainer::new(params(5)).train(&create_simple_dataset())?;
        let names = vec!["a".to_string(), "b".to_string()];
        let importances = trained.feature_importances(&names);
        let total: f64 = importances.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(importances[0].1 >= importances[1].1);
        Ok(())
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let empty = EncodedDataset {
            features: vec![],
            targets: vec![],
            feature_count: 0,
        };
        assert!(GbdtTrainer::new(TrainingParams::default()).train(&empty).is_err());
    }
}
