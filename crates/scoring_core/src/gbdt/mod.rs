//! Integer GBDT evaluator for priority scoring
//!
//! Properties:
//!
//! - **Fixed-point evaluation**: features, thresholds and leaves are `i64`
//!   at [`SCALE`]; the only float conversion happens in
//!   [`Model::predict_unit`]
//! - **Deterministic**: the same encoded vector always reaches the same leaves
//! - **Canonical serialization**: sorted-key JSON, hashed with BLAKE3
//!
//! # Model Format
//!
//! ```json
//! {
//!   "bias": 512000,
//!   "feature_count": 57,
//!   "post_scale": 1000000,
//!   "scale": 1000000,
//!   "trees": [
//!     {
//!       "nodes": [
//!         {"cover":8000,"feature_idx":1,"id":0,"leaf":null,"left":1,"right":2,"threshold":0},
//!         {"cover":3600,"feature_idx":-1,"id":1,"leaf":-41000,"left":-1,"right":-1,"threshold":0},
//!         {"cover":4400,"feature_idx":-1,"id":2,"leaf":33500,"left":-1,"right":-1,"threshold":0}
//!       ],
//!       "weight": 100000
//!     }
//!   ],
//!   "version": 1
//! }
//! ```

pub mod model;
pub mod tree;

pub use model::{Model, MODEL_VERSION, SCALE};
pub use tree::{Node, Tree};

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_canonical_json_roundtrip() {
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 50_000_000, 1, 2).with_cover(3),
                Node::leaf(1, 100_000).with_cover(1),
                Node::leaf(2, 200_000).with_cover(2),
            ],
            SCALE,
        );
        let original = Model::new(vec![tree], 12_345).with_feature_count(1);

        let json = crate::serde_canon::to_canonical_json(&original).unwrap();
        let restored: Model = serde_json::from_str(&json).unwrap();

        assert_eq!(original, restored);
        assert_eq!(original.hash_hex().unwrap(), restored.hash_hex().unwrap());
        assert_eq!(original.score(&[30_000_000]), restored.score(&[30_000_000]));
    }

    #[test]
    fn test_repeated_inference_identical() {
        let tree = Tree::new(
            vec![
                Node::internal(0, 0, 50, 1, 2),
                Node::leaf(1, 7),
                Node::leaf(2, 9),
            ],
            SCALE,
        );
        let model = Model::new(vec![tree], 0);
        let first = model.score(&[30]);
        assert!((0..100).all(|_| model.score(&[30]) == first));
    }
}
