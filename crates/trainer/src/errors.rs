use pmajay_scoring_core::ScoringError;
use thiserror::Error;

/// Errors returned by generation and training.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("generation error: {0}")]
    Generation(String),

    #[error("training error: {0}")]
    Training(String),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrainerError>;
