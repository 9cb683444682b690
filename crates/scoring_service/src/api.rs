//! HTTP routes for scoring and explanation

use axum::{
    extract::{rejection::JsonRejection, State},
    response::Json,
    routing::{get, post},
    Router,
};
use pmajay_scoring_core::{BeneficiaryInput, FeatureContribution, Prediction, ServingContext};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::errors::{Result, ServiceError};
use crate::narration::{narrate_or_fallback, Narrator};

/// Shared, read-only request state
#[derive(Clone)]
pub struct ApiState {
    pub context: Arc<ServingContext>,
    /// Absent when no narration key is configured
    pub narrator: Option<Arc<dyn Narrator>>,
}

impl ApiState {
    pub fn new(context: ServingContext) -> Self {
        Self {
            context: Arc::new(context),
            narrator: None,
        }
    }

    pub fn with_narrator(mut self, narrator: Arc<dyn Narrator>) -> Self {
        self.narrator = Some(narrator);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Display score, 0 to 100
    pub priority_score: u8,
    pub label: String,
    /// Clipped model output in [0, 1]
    pub raw_score: f64,
}

impl From<Prediction> for PredictResponse {
    fn from(prediction: Prediction) -> Self {
        Self {
            priority_score: prediction.display_score,
            label: prediction.label(),
            raw_score: prediction.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorView {
    pub feature: String,
    pub display_name: String,
    pub contribution: f64,
}

impl From<&FeatureContribution> for FactorView {
    fn from(factor: &FeatureContribution) -> Self {
        Self {
            feature: factor.feature.clone(),
            display_name: factor.display_name(),
            contribution: factor.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplainResponse {
    #[serde(flatten)]
    pub prediction: PredictResponse,
    pub factors: Vec<FactorView>,
    pub explanation: String,
    pub narrated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_hash: String,
    pub regions: usize,
    pub features: usize,
}

/// Build the router over `state`
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/explain", post(explain))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_body(payload: std::result::Result<Json<BeneficiaryInput>, JsonRejection>) -> Result<BeneficiaryInput> {
    payload
        .map(|Json(input)| input)
        .map_err(|rejection| ServiceError::BadRequest(rejection.body_text()))
}

async fn predict(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<BeneficiaryInput>, JsonRejection>,
) -> Result<Json<PredictResponse>> {
    let input = parse_body(payload)?;
    let prediction = state.context.predict(&input)?;
    Ok(Json(prediction.into()))
}

async fn explain(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<BeneficiaryInput>, JsonRejection>,
) -> Result<Json<ExplainResponse>> {
    let input = parse_body(payload)?;
    let explanation = state.context.explain(&input)?;
    debug!(
        region = input.region.as_str(),
        factors = explanation.factors.len(),
        "Explained request"
    );

    let narration = narrate_or_fallback(
        state.narrator.as_deref(),
        explanation.prediction.display_score,
        &explanation.factors,
    )
    .await;

    Ok(Json(ExplainResponse {
        prediction: explanation.prediction.into(),
        factors: explanation.factors.iter().map(FactorView::from).collect(),
        explanation: narration.text,
        narrated: narration.narrated,
    }))
}

async fn health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let context = &state.context;
    Json(HealthResponse {
        status: "ok".to_string(),
        model_hash: context.model_hash().to_string(),
        regions: context.regions().len(),
        features: context.encoder().feature_count(),
    })
}
