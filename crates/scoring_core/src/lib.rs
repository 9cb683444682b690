//! Beneficiary priority scoring core
//!
//! Everything shared between offline training and online serving: the region
//! reference table, beneficiary records, the synthetic label formula, the
//! feature encoder, the integer GBDT ensemble and its attribution.
//!
//! Modules:
//! - `region`: Region reference table loading and enrichment lookup
//! - `beneficiary`: Beneficiary records, request inputs and default filling
//! - `formula`: Synthetic priority label
//! - `encoder`: Numeric passthrough plus one-hot encoding to fixed point
//! - `gbdt`: Integer-only gradient boosted tree ensemble
//! - `explain`: TreeSHAP attribution and plain-text factor summaries
//! - `serving`: Read-only context used to score and explain requests
//! - `metrics`: Offline evaluation helpers
//! - `serde_canon`: Canonical JSON persistence with BLAKE3 digests

pub mod beneficiary;
pub mod encoder;
pub mod errors;
pub mod explain;
pub mod formula;
pub mod gbdt;
pub mod metrics;
pub mod region;
pub mod serde_canon;
pub mod serving;

pub use beneficiary::{BeneficiaryDefaults, BeneficiaryInput, BeneficiaryRecord};
pub use encoder::FeatureEncoder;
pub use errors::{InputKind, Result, ScoringError};
pub use explain::{display_name, fallback_summary, Attribution, FallbackStyle, FeatureContribution, TOP_FACTORS};
pub use formula::{priority_label, raw_priority, LabelNoise, PriorityWeights};
pub use gbdt::{Model, Node, Tree, SCALE};
pub use region::{RegionProfile, RegionRecord, RegionTable};
pub use serving::{ArtifactPaths, Explanation, Prediction, ServingContext};

/// Crate version string for artifact metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
