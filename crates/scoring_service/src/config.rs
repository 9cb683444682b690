//! Service configuration
//!
//! Values come from an optional TOML file and are then overridden by
//! environment variables. Narration is enabled only when an API key is set.

use pmajay_scoring_core::ArtifactPaths;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Result, ServiceError};

/// Environment variable naming the optional TOML config file
pub const CONFIG_PATH_VAR: &str = "PMAJAY_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub region_table: PathBuf,
    pub model_path: PathBuf,
    pub encoder_path: PathBuf,
    pub narration: NarrationConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            region_table: PathBuf::from("data/state_reference.csv"),
            model_path: PathBuf::from("models/model.json"),
            encoder_path: PathBuf::from("models/encoder.json"),
            narration: NarrationConfig::default(),
        }
    }
}

/// OpenAI-compatible chat completion settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub api_endpoint: String,
    pub model_name: String,
    pub api_key: Option<String>,
    pub timeout_seconds: u64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://api.groq.com/openai/v1".to_string(),
            model_name: "llama-3.1-8b-instant".to_string(),
            api_key: None,
            timeout_seconds: 10,
            max_tokens: 200,
            temperature: 0.3,
        }
    }
}

impl NarrationConfig {
    pub fn enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl ServiceConfig {
    /// Load from `PMAJAY_CONFIG` if set, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ServiceError::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| ServiceError::Config(format!("Failed to parse config file: {e}")))
    }

    /// Apply overrides from a variable lookup; empty values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = get("PMAJAY_BIND_ADDR") {
            self.bind_addr = addr;
        }
        if let Some(path) = get("PMAJAY_REGION_TABLE") {
            self.region_table = PathBuf::from(path);
        }
        if let Some(path) = get("PMAJAY_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(path) = get("PMAJAY_ENCODER_PATH") {
            self.encoder_path = PathBuf::from(path);
        }
        if let Some(endpoint) = get("NARRATION_API_ENDPOINT") {
            self.narration.api_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("NARRATION_MODEL") {
            self.narration.model_name = model;
        }
        if let Some(key) = get("NARRATION_API_KEY").or_else(|| get("GROQ_API_KEY")) {
            self.narration.api_key = Some(key);
        }
        if let Some(timeout) = get("NARRATION_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.narration.timeout_seconds = timeout;
        }
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths {
            region_table: self.region_table.clone(),
            model: self.model_path.clone(),
            encoder: self.encoder_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_disable_narration() {
        let config = ServiceConfig::default();
        assert!(!config.narration.enabled());
        assert_eq!(config.artifact_paths().model, PathBuf::from("models/model.json"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(lookup(&[
            ("PMAJAY_BIND_ADDR", "127.0.0.1:9000"),
            ("PMAJAY_MODEL_PATH", "/srv/model.json"),
            ("GROQ_API_KEY", "gsk-test"),
            ("NARRATION_TIMEOUT", "3"),
            ("NARRATION_MODEL", ""),
        ]));
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert_eq!(config.model_path, PathBuf::from("/srv/model.json"));
        assert_eq!(config.narration.api_key.as_deref(), Some("gsk-test"));
        assert_eq!(config.narration.timeout_seconds, 3);
        assert_eq!(config.narration.model_name, "llama-3.1-8b-instant");
        assert!(config.narration.enabled());
    }

    #[test]
    fn test_primary_key_wins_over_fallback() {
        let mut config = ServiceConfig::default();
        config.apply_overrides(lookup(&[
            ("NARRATION_API_KEY", "primary"),
            ("GROQ_API_KEY", "fallback"),
        ]));
        assert_eq!(config.narration.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("service.toml");
        fs::write(
            &path,
            "bind_addr = \"127.0.0.1:8100\"\n\n[narration]\ntimeout_seconds = 5\n",
        )
        .unwrap();

        let config = ServiceConfig::from_file(&path).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8100");
        assert_eq!(config.narration.timeout_seconds, 5);
        assert_eq!(config.region_table, PathBuf::from("data/state_reference.csv"));

        let missing = ServiceConfig::from_file(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ServiceError::Config(_))));
    }
}
