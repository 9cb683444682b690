//! Scoring service error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use pmajay_scoring_core::ScoringError;
use serde_json::json;
use thiserror::Error;

/// Scoring service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Malformed request body or missing mandatory field
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Scoring(ScoringError),

    #[error("Narration error: {0}")]
    Narration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ScoringError> for ServiceError {
    fn from(err: ScoringError) -> Self {
        match err {
            ScoringError::InvalidParameters(msg) => ServiceError::BadRequest(msg),
            other => ServiceError::Scoring(other),
        }
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Network(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Result type for service operations
pub type Result<T> = std::result::Result<T, ServiceError>;
