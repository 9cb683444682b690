//! Error types for the scoring core

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which persisted input a load step was looking for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    RegionTable,
    Dataset,
    Model,
    Encoder,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputKind::RegionTable => "region reference table",
            InputKind::Dataset => "dataset",
            InputKind::Model => "model",
            InputKind::Encoder => "encoder",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while loading, encoding or scoring
#[derive(Error, Debug)]
pub enum ScoringError {
    /// A required input file does not exist
    #[error("{kind} file not found: {}", path.display())]
    MissingFile { kind: InputKind, path: PathBuf },

    /// The region reference table is structurally unusable
    #[error("Invalid region table: {0}")]
    InvalidRegionTable(String),

    /// Model structure failed validation
    #[error("Model validation failed: {0}")]
    ValidationFailed(String),

    /// Encoded vector does not match what the model was trained on
    #[error("Feature mismatch: {0}")]
    FeatureMismatch(String),

    /// Invalid generation or training parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Canonical encoding error
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] crate::serde_canon::CanonicalError),
}

impl ScoringError {
    /// Build a `MissingFile` error for `path`
    pub fn missing(kind: InputKind, path: impl Into<PathBuf>) -> Self {
        ScoringError::MissingFile {
            kind,
            path: path.into(),
        }
    }
}

/// Result type for scoring core operations
pub type Result<T> = std::result::Result<T, ScoringError>;
