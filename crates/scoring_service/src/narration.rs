//! Natural-language narration of ranked factors
//!
//! One chat-completion round trip per request, no retry. Any failure
//! degrades to the deterministic factor listing.

use async_trait::async_trait;
use pmajay_scoring_core::{fallback_summary, FallbackStyle, FeatureContribution};
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::NarrationConfig;
use crate::errors::{Result, ServiceError};

/// Turns a score and its ranked factors into prose
#[async_trait]
pub trait Narrator: Send + Sync {
    async fn narrate(&self, display_score: u8, factors: &[FeatureContribution]) -> Result<String>;
}

/// Text shown to the caller and whether a narrator produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Narration {
    pub text: String,
    pub narrated: bool,
}

/// Narrate if possible, otherwise fall back to the factor listing
///
/// Without a narrator the listing carries signed magnitudes; after a
/// narrator failure it carries names only.
pub async fn narrate_or_fallback(
    narrator: Option<&dyn Narrator>,
    display_score: u8,
    factors: &[FeatureContribution],
) -> Narration {
    let Some(narrator) = narrator else {
        return Narration {
            text: fallback_summary(factors, FallbackStyle::WithMagnitudes),
            narrated: false,
        };
    };

    match narrator.narrate(display_score, factors).await {
        Ok(text) if !text.trim().is_empty() => Narration {
            text: text.trim().to_string(),
            narrated: true,
        },
        Ok(_) => {
            warn!("Narrator returned empty text; using fallback");
            Narration {
                text: fallback_summary(factors, FallbackStyle::NamesOnly),
                narrated: false,
            }
        }
        Err(e) => {
            warn!("Narration failed: {}; using fallback", e);
            Narration {
                text: fallback_summary(factors, FallbackStyle::NamesOnly),
                narrated: false,
            }
        }
    }
}

/// Instruction sent with every narration request
pub fn build_prompt(display_score: u8, factors: &[FeatureContribution]) -> String {
    let mut listing = String::new();
    for factor in factors {
        let direction = if factor.value > 0.0 {
            "INCREASED"
        } else {
            "DECREASED"
        };
        let _ = writeln!(
            listing,
            "- Feature: {}, Impact: {:.2} ({} priority)",
            factor.display_name(),
            factor.value,
            direction
        );
    }

    format!(
        "You are an expert caseworker assistant for a government beneficiary scheme.\n\
         Explain a beneficiary's Priority Score (0-100) clearly and concisely from the factors below.\n\n\
         Beneficiary Priority Score: {display_score}/100\n\n\
         Top factors influencing this score:\n{listing}\n\
         Instructions:\n\
         1. Do not mention SHAP values, math or algorithms.\n\
         2. Explain why the score is high or low based on the factors.\n\
         3. Be objective, professional and empathetic.\n\
         4. Keep it to 2-3 sentences."
    )
}

/// OpenAI-compatible chat completion client
pub struct LlmNarrator {
    config: NarrationConfig,
    api_key: String,
    client: reqwest::Client,
}

impl LlmNarrator {
    pub fn new(config: NarrationConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ServiceError::Config("narration API key is not set".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Narrator for LlmNarrator {
    async fn narrate(&self, display_score: u8, factors: &[FeatureContribution]) -> Result<String> {
        let payload = json!({
            "model": self.config.model_name,
            "messages": [
                { "role": "system", "content": "You are a helpful assistant." },
                { "role": "user", "content": build_prompt(display_score, factors) }
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.api_endpoint))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ServiceError::Narration(format!(
                "API request failed: {} - {}",
                status, error_text
            )));
        }

        let body: serde_json::Value = response.json().await?;
        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ServiceError::Narration("No content in response".to_string()))?;
        debug!(chars = text.len(), "Narration received");
        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Narrator for Fixed {
        async fn narrate(&self, _: u8, _: &[FeatureContribution]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl Narrator for Failing {
        async fn narrate(&self, _: u8, _: &[FeatureContribution]) -> Result<String> {
            Err(ServiceError::Network("connection refused".to_string()))
        }
    }

    fn factors() -> Vec<FeatureContribution> {
        vec![
            FeatureContribution {
                feature: "is_bpl".to_string(),
                value: 0.12,
            },
            FeatureContribution {
                feature: "annual_income".to_string(),
                value: -0.05,
            },
        ]
    }

    #[tokio::test]
    async fn test_without_narrator_lists_magnitudes() {
        let narration = narrate_or_fallback(None, 72, &factors()).await;
        assert!(!narration.narrated);
        assert_eq!(
            narration.text,
            "Key factors: Is Bpl (+0.12); Annual Income (-0.05)"
        );
    }

    #[tokio::test]
    async fn test_failure_lists_names_only() {
        let narration = narrate_or_fallback(Some(&Failing), 72, &factors()).await;
        assert!(!narration.narrated);
        assert_eq!(narration.text, "Key factors: Is Bpl; Annual Income");
    }

    #[tokio::test]
    async fn test_narrated_text_is_trimmed() {
        let narrator = Fixed("  Low income raises priority.\n");
        let narration = narrate_or_fallback(Some(&narrator), 72, &factors()).await;
        assert!(narration.narrated);
        assert_eq!(narration.text, "Low income raises priority.");

        let empty = narrate_or_fallback(Some(&Fixed("   ")), 72, &factors()).await;
        assert!(!empty.narrated);
    }

    #[test]
    fn test_prompt_contents() {
        let prompt = build_prompt(72, &factors());
        assert!(prompt.contains("Beneficiary Priority Score: 72/100"));
        assert!(prompt.contains("- Feature: Is Bpl, Impact: 0.12 (INCREASED priority)"));
        assert!(prompt.contains("- Feature: Annual Income, Impact: -0.05 (DECREASED priority)"));
        assert!(prompt.contains("2-3 sentences"));
    }

    #[test]
    fn test_llm_narrator_requires_key() {
        assert!(LlmNarrator::new(NarrationConfig::default()).is_err());
        let config = NarrationConfig {
            api_key: Some("gsk-test".to_string()),
            ..NarrationConfig::default()
        };
        assert!(LlmNarrator::new(config).is_ok());
    }
}
