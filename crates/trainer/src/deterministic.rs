//! Deterministic utilities for reproducible generation and training
//!
//! Seeded ChaCha streams, a seeded train/validation partition and the
//! tie-breaking order used when two splits have equal gain.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Default seed of the synthetic generator
pub const GENERATOR_SEED: u64 = 67;

/// Default seed of the train/validation partition
pub const PARTITION_SEED: u64 = 69;

/// Fraction of rows held out for validation
pub const VALIDATION_FRACTION: f64 = 0.2;

/// Portable, seedable stream; identical across platforms for a given seed
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Row indices of a shuffled train/validation partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Shuffle `0..n` with `seed` and hold out `ceil(fraction * n)` rows
pub fn partition_indices(n: usize, fraction: f64, seed: u64) -> Partition {
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut seeded_rng(seed));

    let held_out = ((fraction.clamp(0.0, 1.0) * n as f64).ceil() as usize).min(n);
    let train = order.split_off(held_out);
    Partition {
        train,
        validation: order,
    }
}

/// Deterministic tie-breaker for split selection
/// Returns consistent ordering based on (feature_idx, threshold, node_id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SplitTieBreaker {
    pub feature_idx: usize,
    pub threshold: i64,
    pub node_id: usize,
}

impl SplitTieBreaker {
    pub fn new(feature_idx: usize, threshold: i64, node_id: usize) -> Self {
        Self {
            feature_idx,
            threshold,
            node_id,
        }
    }
}
