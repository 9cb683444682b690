//! Per-feature attribution for a single prediction
//!
//! Exact path-dependent TreeSHAP over the integer ensemble. Node covers
//! stand in for the training distribution, so for any input
//! `baseline + Σ contributions` equals the model's raw (unclipped)
//! prediction up to fixed-point rounding.

use serde::Serialize;

use crate::gbdt::{Model, Tree};

/// Number of factors surfaced by the explain path
pub const TOP_FACTORS: usize = 5;

/// Signed contribution of one encoded feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: f64,
}

impl FeatureContribution {
    pub fn display_name(&self) -> String {
        display_name(&self.feature)
    }
}

/// Full attribution of one prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// Expected model output over the training distribution
    pub baseline: f64,
    /// One entry per encoded feature, in encoder order
    pub contributions: Vec<FeatureContribution>,
}

impl Attribution {
    /// Baseline plus every contribution
    pub fn total(&self) -> f64 {
        self.baseline + self.contributions.iter().map(|c| c.value).sum::<f64>()
    }

    /// The `k` largest contributions by magnitude, largest first
    pub fn top(&self, k: usize) -> Vec<FeatureContribution> {
        let mut ranked = self.contributions.clone();
        // stable sort keeps encoder order among equal magnitudes
        ranked.sort_by(|a, b| b.value.abs().total_cmp(&a.value.abs()));
        ranked.truncate(k);
        ranked
    }
}

/// How the plain-text fallback renders factors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStyle {
    NamesOnly,
    WithMagnitudes,
}

/// `education_level_Secondary` -> `Education Level Secondary`
pub fn display_name(feature: &str) -> String {
    feature
        .replace('_', " ")
        .split(' ')
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Deterministic text rendering of ranked factors
pub fn fallback_summary(factors: &[FeatureContribution], style: FallbackStyle) -> String {
    let rendered: Vec<String> = factors
        .iter()
        .map(|f| match style {
            FallbackStyle::NamesOnly => f.display_name(),
            FallbackStyle::WithMagnitudes => {
                let sign = if f.value > 0.0 { "+" } else { "" };
                format!("{} ({sign}{:.2})", f.display_name(), f.value)
            }
        })
        .collect();
    format!("Key factors: {}", rendered.join("; "))
}

/// Compute the attribution of `features` under `model`
///
/// `feature_names` must match the encoded width.
pub fn attribute(model: &Model, features: &[i64], feature_names: &[String]) -> Attribution {
    let width = feature_names.len().max(features.len());
    let mut phi = vec![0.0f64; width];
    let mut baseline = model.bias as f64 / model.post_scale as f64;

    for tree in &model.trees {
        let unit = tree.weight as f64 / model.scale as f64 / model.post_scale as f64;
        baseline += expected_value(tree, 0) * unit;

        let mut tree_phi = vec![0.0f64; width];
        let mut walker = ShapWalker {
            tree,
            features,
            phi: &mut tree_phi,
        };
        walker.recurse(0, Vec::new(), 1.0, 1.0, None);

        for (total, value) in phi.iter_mut().zip(tree_phi) {
            *total += value * unit;
        }
    }

    let contributions = phi
        .into_iter()
        .enumerate()
        .map(|(i, value)| FeatureContribution {
            feature: feature_names
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("feature_{i}")),
            value,
        })
        .collect();

    Attribution {
        baseline,
        contributions,
    }
}

/// Cover-weighted mean leaf value below `idx`, in leaf units
fn expected_value(tree: &Tree, idx: usize) -> f64 {
    let Some(node) = tree.nodes.get(idx) else {
        return 0.0;
    };
    if node.is_leaf() {
        return node.leaf_value().unwrap_or(0) as f64;
    }

    let (left, right) = (node.left as usize, node.right as usize);
    let (left_frac, right_frac) = child_fractions(tree, idx, left, right);
    left_frac * expected_value(tree, left) + right_frac * expected_value(tree, right)
}

/// Share of the parent's cover that went to each child
fn child_fractions(tree: &Tree, parent: usize, left: usize, right: usize) -> (f64, f64) {
    let cover = |i: usize| tree.nodes.get(i).map_or(0, |n| n.cover) as f64;
    let total = cover(parent);
    if total <= 0.0 {
        // trees built without covers split mass evenly
        return (0.5, 0.5);
    }
    (cover(left) / total, cover(right) / total)
}

#[derive(Debug, Clone, Copy)]
struct PathElement {
    feature: Option<usize>,
    zero_fraction: f64,
    one_fraction: f64,
    weight: f64,
}

struct ShapWalker<'a> {
    tree: &'a Tree,
    features: &'a [i64],
    phi: &'a mut [f64],
}

impl ShapWalker<'_> {
    fn recurse(
        &mut self,
        idx: usize,
        mut path: Vec<PathElement>,
        zero_fraction: f64,
        one_fraction: f64,
        feature: Option<usize>,
    ) {
        // Unreachable from both the input and the background distribution
        if zero_fraction == 0.0 && one_fraction == 0.0 {
            return;
        }
        extend_path(&mut path, zero_fraction, one_fraction, feature);

        let Some(node) = self.tree.nodes.get(idx) else {
            return;
        };

        if node.is_leaf() {
            let leaf = node.leaf_value().unwrap_or(0) as f64;
            for i in 1..path.len() {
                let w = unwound_path_sum(&path, i);
                let el = path[i];
                if let Some(slot) = el.feature.and_then(|f| self.phi.get_mut(f)) {
                    *slot += w * (el.one_fraction - el.zero_fraction) * leaf;
                }
            }
            return;
        }

        let split_feature = node.feature_idx as usize;
        let Some(hot) = self.tree.next_index(node, self.features) else {
            return;
        };
        let (left, right) = (node.left as usize, node.right as usize);
        let cold = if hot == left { right } else { left };
        let (left_frac, right_frac) = child_fractions(self.tree, idx, left, right);
        let (hot_frac, cold_frac) = if hot == left {
            (left_frac, right_frac)
        } else {
            (right_frac, left_frac)
        };

        // A feature already on the path is unwound and re-entered here
        let mut incoming_zero = 1.0;
        let mut incoming_one = 1.0;
        if let Some(k) = path.iter().position(|e| e.feature == Some(split_feature)) {
            incoming_zero = path[k].zero_fraction;
            incoming_one = path[k].one_fraction;
            unwind_path(&mut path, k);
        }

        self.recurse(
            hot,
            path.clone(),
            hot_frac * incoming_zero,
            incoming_one,
            Some(split_feature),
        );
        self.recurse(
            cold,
            path,
            cold_frac * incoming_zero,
            0.0,
            Some(split_feature),
        );
    }
}

fn extend_path(path: &mut Vec<PathElement>, zero_fraction: f64, one_fraction: f64, feature: Option<usize>) {
    let depth = path.len();
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        weight: if depth == 0 { 1.0 } else { 0.0 },
    });

    let denom = (depth + 1) as f64;
    for i in (0..depth).rev() {
        path[i + 1].weight += one_fraction * path[i].weight * (i + 1) as f64 / denom;
        path[i].weight = zero_fraction * path[i].weight * (depth - i) as f64 / denom;
    }
}

fn unwind_path(path: &mut Vec<PathElement>, index: usize) {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].weight;
            path[i].weight = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].weight * zero_fraction * (depth - i) as f64 / denom;
        } else {
            path[i].weight = path[i].weight * denom / (zero_fraction * (depth - i) as f64);
        }
    }

    for i in index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
    path.pop();
}

fn unwound_path_sum(path: &[PathElement], index: usize) -> f64 {
    let depth = path.len() - 1;
    let one_fraction = path[index].one_fraction;
    let zero_fraction = path[index].zero_fraction;
    let denom = (depth + 1) as f64;
    let mut next_one_portion = path[depth].weight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * denom / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].weight - tmp * zero_fraction * (depth - i) as f64 / denom;
        } else if zero_fraction != 0.0 {
            total += path[i].weight / zero_fraction / ((depth - i) as f64 / denom);
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gbdt::{Node, SCALE};

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    fn stump() -> Model {
        // f0 <= 0.5 -> 0.2 (cover 6), else 0.8 (cover 4)
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, SCALE / 2, 1, 2).with_cover(10),
                Node::leaf(1, SCALE / 5).with_cover(6),
                Node::leaf(2, 4 * SCALE / 5).with_cover(4),
            ],
            SCALE,
        );
        Model::new(vec![tree], 0).with_feature_count(2)
    }

    #[test]
    fn test_single_split_attribution() {
        let model = stump();
        let attribution = attribute(&model, &[SCALE, 0], &names(2));

        // baseline = 0.6*0.2 + 0.4*0.8
        assert!((attribution.baseline - 0.44).abs() < 1e-9);
        assert!((attribution.contributions[0].value - 0.36).abs() < 1e-9);
        assert_eq!(attribution.contributions[1].value, 0.0);
        assert!((attribution.total() - model.predict_raw(&[SCALE, 0])).abs() < 1e-9);
    }

    #[test]
    fn test_interaction_tree_is_additive() {
        // depth-2 tree splitting on f0 then f1 / f0 again
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 0, 1, 2).with_cover(100),
                Node::internal(1, 1, 0, 3, 4).with_cover(40),
                Node::internal(2, 0, SCALE, 5, 6).with_cover(60),
                Node::leaf(3, 100_000).with_cover(10),
                Node::leaf(4, 300_000).with_cover(30),
                Node::leaf(5, 600_000).with_cover(20),
                Node::leaf(6, 900_000).with_cover(40),
            ],
            SCALE / 10,
        );
        let model = Model::new(vec![tree.clone(), tree], 250_000).with_feature_count(3);

        for features in [[0, 0, 0], [0, SCALE, 7], [SCALE, 0, 0], [2 * SCALE, SCALE, 0]] {
            let attribution = attribute(&model, &features, &names(3));
            assert!(
                (attribution.total() - model.predict_raw(&features)).abs() < 1e-6,
                "additivity failed for {features:?}"
            );
            assert_eq!(attribution.contributions[2].value, 0.0);
        }
    }

    #[test]
    fn test_top_sorted_by_magnitude() {
        let attribution = Attribution {
            baseline: 0.5,
            contributions: vec![
                FeatureContribution { feature: "a".into(), value: 0.01 },
                FeatureContribution { feature: "b".into(), value: -0.30 },
                FeatureContribution { feature: "c".into(), value: 0.20 },
                FeatureContribution { feature: "d".into(), value: 0.0 },
            ],
        };
        let top = attribution.top(3);
        let order: Vec<&str> = top.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(attribution.top(10).len(), 4);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("annual_income"), "Annual Income");
        assert_eq!(display_name("is_bpl"), "Is Bpl");
        assert_eq!(
            display_name("employment_status_Casual Labor"),
            "Employment Status Casual Labor"
        );
    }

    #[test]
    fn test_fallback_summary_styles() {
        let factors = vec![
            FeatureContribution { feature: "is_bpl".into(), value: 0.123 },
            FeatureContribution { feature: "annual_income".into(), value: -0.05 },
        ];
        assert_eq!(
            fallback_summary(&factors, FallbackStyle::NamesOnly),
            "Key factors: Is Bpl; Annual Income"
        );
        assert_eq!(
            fallback_summary(&factors, FallbackStyle::WithMagnitudes),
            "Key factors: Is Bpl (+0.12); Annual Income (-0.05)"
        );
    }
}
