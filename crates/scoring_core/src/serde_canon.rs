//! Canonical JSON persistence for trained artifacts
//!
//! The encoder and model are written as canonical JSON so that two training
//! runs with the same seeds produce byte-identical files and the same
//! BLAKE3 digest:
//! - Object keys sorted recursively
//! - No whitespace or pretty-printing
//! - Digest computed over exactly the bytes written to disk

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::errors::{InputKind, Result, ScoringError};

#[derive(Error, Debug)]
pub enum CanonicalError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Serialize a value to canonical JSON (sorted keys, no whitespace)
pub fn to_canonical_json<T: Serialize>(value: &T) -> std::result::Result<String, CanonicalError> {
    let json_value = serde_json::to_value(value)
        .map_err(|e| CanonicalError::SerializationError(e.to_string()))?;

    serde_json::to_string(&canonicalize_value(json_value))
        .map_err(|e| CanonicalError::SerializationError(e.to_string()))
}

fn canonicalize_value(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => {
            let sorted: BTreeMap<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, canonicalize_value(v)))
                .collect();
            serde_json::Value::Object(sorted.into_iter().collect())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(canonicalize_value).collect())
        }
        other => other,
    }
}

/// BLAKE3 digest of the canonical JSON form, hex encoded
pub fn canonical_digest_hex<T: Serialize>(value: &T) -> std::result::Result<String, CanonicalError> {
    let json = to_canonical_json(value)?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}

/// Write `value` as canonical JSON and return the digest of the written bytes
pub fn write_canonical<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> Result<String> {
    let json = to_canonical_json(value)?;
    fs::write(path.as_ref(), json.as_bytes())?;
    Ok(hex::encode(blake3::hash(json.as_bytes()).as_bytes()))
}

/// Read a JSON artifact, reporting a missing file as `MissingFile { kind }`
pub fn read_artifact<T: DeserializeOwned, P: AsRef<Path>>(path: P, kind: InputKind) -> Result<T> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ScoringError::missing(kind, path));
    }
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Column {
        width: i64,
        name: String,
        categories: Vec<String>,
    }

    fn sample() -> Column {
        Column {
            width: 2,
            name: "gender".to_string(),
            categories: vec!["Female".to_string(), "Male".to_string()],
        }
    }

    #[test]
    fn test_keys_sorted_without_whitespace() {
        let json = to_canonical_json(&sample()).unwrap();
        assert_eq!(
            json,
            r#"{"categories":["Female","Male"],"name":"gender","width":2}"#
        );
    }

    #[test]
    fn test_digest_stable_and_sensitive() {
        let a = canonical_digest_hex(&sample()).unwrap();
        let b = canonical_digest_hex(&sample()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = sample();
        changed.width = 3;
        assert_ne!(a, canonical_digest_hex(&changed).unwrap());
    }

    #[test]
    fn test_write_then_read_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("column.json");

        let digest = write_canonical(&sample(), &path).unwrap();
        assert_eq!(digest, canonical_digest_hex(&sample()).unwrap());

        let restored: Column = read_artifact(&path, InputKind::Encoder).unwrap();
        assert_eq!(restored, sample());
    }

    #[test]
    fn test_missing_artifact_names_kind() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_artifact::<Column, _>(dir.path().join("nope.json"), InputKind::Model)
            .unwrap_err();
        assert!(matches!(
            err,
            ScoringError::MissingFile {
                kind: InputKind::Model,
                ..
            }
        ));
        assert!(err.to_string().starts_with("model file not found"));
    }
}
