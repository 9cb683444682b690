//! Beneficiary priority scoring service
//!
//! Serves `/predict`, `/explain` and `/health` over a serving context that is
//! loaded once at startup and shared read-only across requests. Explanations
//! are optionally narrated by an external chat-completion endpoint.

pub mod api;
pub mod config;
pub mod errors;
pub mod narration;

pub use api::{create_router, ApiState, ExplainResponse, FactorView, HealthResponse, PredictResponse};
pub use config::{NarrationConfig, ServiceConfig};
pub use errors::{Result, ServiceError};
pub use narration::{narrate_or_fallback, LlmNarrator, Narration, Narrator};

use pmajay_scoring_core::ServingContext;
use std::sync::Arc;
use tracing::info;

/// Load artifacts and wire the narrator described by `config`
pub fn build_state(config: &ServiceConfig) -> Result<ApiState> {
    let context = ServingContext::load(&config.artifact_paths())?;
    let state = ApiState::new(context);

    if config.narration.enabled() {
        let narrator = LlmNarrator::new(config.narration.clone())?;
        info!(model = %config.narration.model_name, "Narration enabled");
        Ok(state.with_narrator(Arc::new(narrator)))
    } else {
        info!("Narration disabled; explanations use the factor listing");
        Ok(state)
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
