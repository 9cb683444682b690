//! CART (Classification and Regression Tree) builder
//!
//! Deterministic histogram-based regression tree construction in
//! fixed-point arithmetic. Candidate thresholds come from per-feature bins
//! computed once per training run; the per-feature search runs on rayon and
//! the winner is picked sequentially with [`SplitTieBreaker`].

use pmajay_scoring_core::gbdt::{Node, Tree};
use rayon::prelude::*;

use crate::deterministic::SplitTieBreaker;

/// Upper bound on bins per feature
pub const MAX_BINS: usize = 256;

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// L2 penalty on leaf values, in sample units (hessian is 1 per row)
    pub l2: i64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 6,
            min_samples_leaf: 1,
            l2: 1,
        }
    }
}

/// Feature matrix quantized into per-feature bins
///
/// Bin `b` of feature `f` holds values `v` with
/// `thresholds[f][b-1] < v <= thresholds[f][b]`, so splitting after bin `b`
/// is the node test `v <= thresholds[f][b]`.
#[derive(Clone, Debug)]
pub struct BinnedFeatures {
    /// Candidate split values per feature, strictly increasing
    pub thresholds: Vec<Vec<i64>>,
    /// Column-major bin index of every sample
    bins: Vec<Vec<u16>>,
    rows: usize,
}

impl BinnedFeatures {
    /// Quantize `features` (row-major) into at most `max_bins` bins per feature
    ///
    /// Features with no more than `max_bins` distinct values keep every
    /// distinct value as a boundary; others use sample quantiles.
    pub fn new(features: &[Vec<i64>], feature_count: usize, max_bins: usize) -> Self {
        let max_bins = max_bins.clamp(2, MAX_BINS);
        let rows = features.len();

        let (thresholds, bins): (Vec<Vec<i64>>, Vec<Vec<u16>>) = (0..feature_count)
            .into_par_iter()
            .map(|f| {
                let column: Vec<i64> = features
                    .iter()
                    .map(|row| row.get(f).copied().unwrap_or(0))
                    .collect();
                let cuts = cut_points(&column, max_bins);
                let bins: Vec<u16> = column
                    .iter()
                    .map(|v| cuts.partition_point(|t| t < v) as u16)
                    .collect();
                (cuts, bins)
            })
            .unzip();

        Self {
            thresholds,
            bins,
            rows,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.thresholds.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }
}

/// Boundaries for one feature; the column maximum is never a boundary
fn cut_points(column: &[i64], max_bins: usize) -> Vec<i64> {
    let mut sorted = column.to_vec();
    sorted.sort_unstable();

    let mut distinct = sorted.clone();
    distinct.dedup();

    let mut cuts = if distinct.len() <= max_bins {
        distinct
    } else {
        let n = sorted.len();
        let mut quantiles: Vec<i64> = (1..max_bins).map(|k| sorted[k * n / max_bins]).collect();
        quantiles.dedup();
        quantiles
    };

    if let Some(&max) = sorted.last() {
        cuts.retain(|&c| c < max);
    }
    cuts
}

/// Best split found for one feature
#[derive(Debug, Clone)]
struct SplitCandidate {
    feature_idx: usize,
    /// Last bin routed left
    bin: usize,
    threshold: i64,
    gain: i128,
    tie_breaker: SplitTieBreaker,
}

impl SplitCandidate {
    fn new(feature_idx: usize, bin: usize, threshold: i64, gain: i128, node_id: usize) -> Self {
        Self {
            feature_idx,
            bin,
            threshold,
            gain,
            tie_breaker: SplitTieBreaker::new(feature_idx, threshold, node_id),
        }
    }

    fn beats(&self, other: &SplitCandidate) -> bool {
        self.gain > other.gain || (self.gain == other.gain && self.tie_breaker < other.tie_breaker)
    }
}

/// A built tree plus the gain credited to each feature
#[derive(Debug, Clone)]
pub struct GrownTree {
    pub tree: Tree,
    pub feature_gain: Vec<f64>,
}

/// Build a regression tree over binned features
pub struct CartBuilder<'a> {
    config: TreeConfig,
    data: &'a BinnedFeatures,
    gradients: &'a [i64],
}

impl<'a> CartBuilder<'a> {
    pub fn new(data: &'a BinnedFeatures, gradients: &'a [i64], config: TreeConfig) -> Self {
        debug_assert_eq!(data.rows(), gradients.len());
        Self {
            config,
            data,
            gradients,
        }
    }

    /// Build tree; leaf values are unshrunk, `weight` is applied by the caller
    pub fn build(&self, weight: i64) -> GrownTree {
        let mut nodes = Vec::new();
        let mut feature_gain = vec![0.0; self.data.feature_count()];
        let indices: Vec<usize> = (0..self.data.rows()).collect();

        self.build_node(&indices, 0, 0, &mut nodes, &mut feature_gain);

        GrownTree {
            tree: Tree::new(nodes, weight),
            feature_gain,
        }
    }

    /// Recursively build tree nodes in pre-order, returning the node index
    fn build_node(
        &self,
        indices: &[usize],
        depth: usize,
        node_id: usize,
        nodes: &mut Vec<Node>,
        feature_gain: &mut [f64],
    ) -> i32 {
        let current_idx = nodes.len() as i32;
        let cover = indices.len() as u32;
        let (sum_g, count) = self.sum_gradients(indices);

        let split = if depth >= self.config.max_depth
            || indices.len() < 2 * self.config.min_samples_leaf.max(1)
        {
            None
        } else {
            self.find_best_split(indices, sum_g, count, node_id)
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current_idx, self.leaf_value(sum_g, count)).with_cover(cover));
            return current_idx;
        };

        let column = &self.data.bins[split.feature_idx];
        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| usize::from(column[i]) <= split.bin);

        feature_gain[split.feature_idx] += split.gain as f64;

        // Reserve space for current node
        nodes.push(
            Node::internal(current_idx, split.feature_idx as i32, split.threshold, -1, -1)
                .with_cover(cover),
        );

        let left_idx = self.build_node(&left, depth + 1, node_id * 2 + 1, nodes, feature_gain);
        let right_idx = self.build_node(&right, depth + 1, node_id * 2 + 2, nodes, feature_gain);

        let node = &mut nodes[current_idx as usize];
        node.left = left_idx;
        node.right = right_idx;

        current_idx
    }

    fn find_best_split(
        &self,
        indices: &[usize],
        sum_g: i64,
        count: i64,
        node_id: usize,
    ) -> Option<SplitCandidate> {
        let parent_score = self.score(sum_g, count);

        let per_feature: Vec<Option<SplitCandidate>> = (0..self.data.feature_count())
            .into_par_iter()
            .map(|f| self.best_split_for_feature(f, indices, sum_g, count, parent_score, node_id))
            .collect();

        // Sequential reduction keeps the choice independent of thread timing
        per_feature
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, candidate| match best {
                Some(current) if !candidate.beats(&current) => Some(current),
                _ => Some(candidate),
            })
    }

    fn best_split_for_feature(
        &self,
        feature_idx: usize,
        indices: &[usize],
        sum_g: i64,
        count: i64,
        parent_score: i128,
        node_id: usize,
    ) -> Option<SplitCandidate> {
        let thresholds = &self.data.thresholds[feature_idx];
        if thresholds.is_empty() {
            return None;
        }

        let column = &self.data.bins[feature_idx];
        let mut hist_g = vec![0i64; thresholds.len() + 1];
        let mut hist_n = vec![0i64; thresholds.len() + 1];
        for &i in indices {
            let b = usize::from(column[i]);
            hist_g[b] = hist_g[b].saturating_add(self.gradients[i]);
            hist_n[b] += 1;
        }

        let min_leaf = self.config.min_samples_leaf.max(1) as i64;
        let mut best: Option<SplitCandidate> = None;
        let (mut left_g, mut left_n) = (0i64, 0i64);

        for (bin, &threshold) in thresholds.iter().enumerate() {
            left_g = left_g.saturating_add(hist_g[bin]);
            left_n += hist_n[bin];
            let right_n = count - left_n;

            if hist_n[bin] == 0 || left_n < min_leaf {
                continue;
            }
            if right_n < min_leaf {
                break;
            }

            let right_g = sum_g.saturating_sub(left_g);
            let gain = self.score(left_g, left_n) + self.score(right_g, right_n) - parent_score;
            if gain <= 0 {
                continue;
            }

            // Ascending thresholds: strict improvement keeps the smallest on ties
            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate::new(feature_idx, bin, threshold, gain, node_id));
            }
        }

        best
    }

    /// G² / (H + λ) in i128
    fn score(&self, sum_g: i64, count: i64) -> i128 {
        let denom = (count + self.config.l2) as i128;
        if denom <= 0 {
            return 0;
        }
        (sum_g as i128 * sum_g as i128) / denom
    }

    fn sum_gradients(&self, indices: &[usize]) -> (i64, i64) {
        let sum_g = indices
            .iter()
            .fold(0i64, |acc, &i| acc.saturating_add(self.gradients[i]));
        (sum_g, indices.len() as i64)
    }

    /// Optimal leaf value: -G / (H + λ)
    fn leaf_value(&self, sum_g: i64, count: i64) -> i64 {
        let denom = (count + self.config.l2) as i128;
        if denom <= 0 {
            return 0;
        }
        (-(sum_g as i128) / denom) as i64
    }
}
