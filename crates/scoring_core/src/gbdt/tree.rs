//! Decision tree structures for the scoring ensemble
//!
//! Integer-only nodes and traversal. Thresholds and leaf values are
//! fixed-point integers at the model's scale; `cover` records how many
//! training rows reached the node and drives attribution.

use serde::{Deserialize, Serialize};

/// One split or leaf of a regression tree
///
/// Splits carry `feature_idx >= 0` and child positions in `left`/`right`.
/// Leaves carry `feature_idx == -1`, `-1` children and a value in `leaf`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Node {
    /// Position of the node in `Tree::nodes`
    pub id: i32,

    pub left: i32,
    pub right: i32,

    /// Encoded feature to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Go left when `feature <= threshold`
    pub threshold: i64,

    /// Fixed-point output, present only on leaves
    pub leaf: Option<i64>,

    /// Training rows routed through this node
    #[serde(default)]
    pub cover: u32,
}

impl Node {
    /// Split sending `features[feature_idx] <= threshold` left
    pub fn internal(id: i32, feature_idx: i32, threshold: i64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
            cover: 0,
        }
    }

    /// Terminal node holding `value`
    pub fn leaf(id: i32, value: i64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0,
            leaf: Some(value),
            cover: 0,
        }
    }

    /// Attach the number of training rows that reached this node
    pub fn with_cover(mut self, cover: u32) -> Self {
        self.cover = cover;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    pub fn leaf_value(&self) -> Option<i64> {
        self.leaf
    }
}

/// One member of the ensemble
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Tree {
    /// Pre-order node list, root first
    pub nodes: Vec<Node>,

    /// Shrinkage applied to every leaf of this tree (fixed-point)
    pub weight: i64,
}

impl Tree {
    pub fn new(nodes: Vec<Node>, weight: i64) -> Self {
        Self { nodes, weight }
    }

    /// Index of the leaf reached by `features`, or `None` on a malformed path
    pub fn leaf_index(&self, features: &[i64]) -> Option<usize> {
        let mut idx = 0usize;

        loop {
            let node = self.nodes.get(idx)?;
            if node.is_leaf() {
                return Some(idx);
            }
            idx = self.next_index(node, features)?;
        }
    }

    /// Child index taken at internal `node` for `features`
    pub fn next_index(&self, node: &Node, features: &[i64]) -> Option<usize> {
        let value = *features.get(usize::try_from(node.feature_idx).ok()?)?;
        let child = if value <= node.threshold {
            node.left
        } else {
            node.right
        };
        let child = usize::try_from(child).ok()?;
        (child < self.nodes.len()).then_some(child)
    }

    /// Evaluate this tree on a feature vector; malformed paths evaluate to 0
    pub fn evaluate(&self, features: &[i64]) -> i64 {
        self.leaf_index(features)
            .and_then(|idx| self.nodes[idx].leaf_value())
            .unwrap_or(0)
    }

    /// Number of leaves
    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Check child links and leaf values
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if node.is_leaf() {
                if node.leaf.is_none() {
                    return Err(format!("leaf {i} carries no value"));
                }
                continue;
            }

            for child in [node.left, node.right] {
                let in_range = usize::try_from(child).is_ok_and(|c| c > i && c < self.nodes.len());
                if !in_range {
                    return Err(format!("split {i} has bad child {child}"));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump() -> Tree {
        Tree::new(
            vec![
                Node::internal(0, 0, 50, 1, 2).with_cover(10),
                Node::leaf(1, 100).with_cover(4),
                Node::leaf(2, 200).with_cover(6),
            ],
            1_000_000,
        )
    }

    #[test]
    fn test_split_and_leaf_constructors() {
        let split = Node::internal(0, 3, 12345, 1, 2);
        assert_eq!(split.threshold, 12345);
        assert!(!split.is_leaf());

        let leaf = Node::leaf(1, -234).with_cover(7);
        assert_eq!(leaf.feature_idx, -1);
        assert!(leaf.is_leaf());
        assert_eq!(leaf.leaf_value(), Some(-234));
        assert_eq!(leaf.cover, 7);
    }

    #[test]
    fn test_threshold_routing() {
        let tree = stump();
        assert_eq!(tree.evaluate(&[30]), 100);
        assert_eq!(tree.evaluate(&[50]), 100); // equal goes left
        assert_eq!(tree.evaluate(&[60]), 200);
        assert_eq!(tree.leaf_index(&[60]), Some(2));
    }

    #[test]
    fn test_missing_feature_evaluates_to_zero() {
        assert_eq!(stump().evaluate(&[]), 0);
    }

    #[test]
    fn test_structure_checks() {
        assert!(stump().validate().is_ok());
        assert_eq!(stump().leaf_count(), 2);

        let invalid = Tree::new(
            vec![
                Node::internal(0, 0, 50, 5, 2),
                Node::leaf(1, 100),
                Node::leaf(2, 200),
            ],
            1_000_000,
        );
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_cover_defaults_when_absent_from_json() {
        let json = r#"{"id":1,"left":-1,"right":-1,"feature_idx":-1,"threshold":0,"leaf":5}"#;
        let node: Node = serde_json::from_str(json).unwrap();
        assert_eq!(node.cover, 0);
        assert_eq!(node.leaf, Some(5));
    }
}
