//! Feature encoding for the scoring ensemble
//!
//! Numeric fields pass through unchanged (converted to fixed point) and the
//! four categorical fields are one-hot encoded. Category vocabularies are
//! learned at fit time and sorted, so the encoded layout is a pure function
//! of the training rows. A value outside the vocabulary encodes to an
//! all-zero block.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use crate::beneficiary::BeneficiaryRecord;
use crate::errors::{InputKind, Result, ScoringError};
use crate::gbdt::SCALE;
use crate::serde_canon::{read_artifact, write_canonical};

/// Passthrough numeric features, in encoded order
pub const NUMERIC_FEATURES: [&str; 11] = [
    "annual_income",
    "is_bpl",
    "rural",
    "household_size",
    "age",
    "applied_other_scheme_before",
    "benefited_other_scheme_before",
    "avg_income_per_capita",
    "literacy_rate",
    "poverty_rate",
    "population_share",
];

/// One-hot encoded features, in encoded order
pub const CATEGORICAL_FEATURES: [&str; 4] =
    ["region", "gender", "education_level", "employment_status"];

/// Convert a float to the model's fixed-point representation
pub fn to_fixed(value: f64) -> i64 {
    (value * SCALE as f64).round() as i64
}

fn numeric_values(record: &BeneficiaryRecord) -> [f64; 11] {
    let flag = |b: bool| if b { 1.0 } else { 0.0 };
    [
        record.annual_income,
        flag(record.is_bpl),
        flag(record.rural),
        f64::from(record.household_size),
        record.age,
        flag(record.applied_other_scheme_before),
        flag(record.benefited_other_scheme_before),
        record.profile.avg_income_per_capita,
        record.profile.literacy_rate,
        record.profile.poverty_rate,
        record.profile.population_share,
    ]
}

fn categorical_values(record: &BeneficiaryRecord) -> [&str; 4] {
    [
        record.region.as_str(),
        record.gender.as_str(),
        record.education_level.as_str(),
        record.employment_status.as_str(),
    ]
}

/// Learned vocabulary for one categorical column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalColumn {
    pub name: String,
    pub categories: Vec<String>,
}

impl CategoricalColumn {
    fn position(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }
}

/// Fitted encoder artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    pub numeric: Vec<String>,
    pub categorical: Vec<CategoricalColumn>,
}

impl FeatureEncoder {
    /// Learn category vocabularies from training records
    pub fn fit(records: &[BeneficiaryRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(ScoringError::InvalidParameters(
                "cannot fit encoder on zero records".to_string(),
            ));
        }

        let mut vocab: Vec<BTreeSet<&str>> = vec![BTreeSet::new(); CATEGORICAL_FEATURES.len()];
        for record in records {
            for (set, value) in vocab.iter_mut().zip(categorical_values(record)) {
                set.insert(value);
            }
        }

        let categorical = CATEGORICAL_FEATURES
            .iter()
            .zip(vocab)
            .map(|(name, set)| CategoricalColumn {
                name: name.to_string(),
                categories: set.into_iter().map(str::to_string).collect(),
            })
            .collect();

        Ok(Self {
            numeric: NUMERIC_FEATURES.iter().map(|s| s.to_string()).collect(),
            categorical,
        })
    }

    pub fn feature_count(&self) -> usize {
        self.numeric.len()
            + self
                .categorical
                .iter()
                .map(|c| c.categories.len())
                .sum::<usize>()
    }

    /// Names of the encoded columns, `<column>_<category>` for one-hot blocks
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.numeric.clone();
        for column in &self.categorical {
            names.extend(
                column
                    .categories
                    .iter()
                    .map(|c| format!("{}_{}", column.name, c)),
            );
        }
        names
    }

    /// Encode one record into fixed-point features
    pub fn transform(&self, record: &BeneficiaryRecord) -> Vec<i64> {
        let mut encoded = Vec::with_capacity(self.feature_count());
        encoded.extend(numeric_values(record).iter().map(|&v| to_fixed(v)));

        for (column, value) in self.categorical.iter().zip(categorical_values(record)) {
            let block_start = encoded.len();
            encoded.resize(block_start + column.categories.len(), 0);
            match column.position(value) {
                Some(hot) => encoded[block_start + hot] = SCALE,
                None => debug!(
                    column = column.name.as_str(),
                    value, "Unknown category, encoding as zero vector"
                ),
            }
        }

        encoded
    }

    pub fn transform_all(&self, records: &[BeneficiaryRecord]) -> Vec<Vec<i64>> {
        records.iter().map(|r| self.transform(r)).collect()
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        write_canonical(self, path)
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let encoder: FeatureEncoder = read_artifact(path, InputKind::Encoder)?;
        if encoder.numeric.len() != NUMERIC_FEATURES.len()
            || encoder.categorical.len() != CATEGORICAL_FEATURES.len()
        {
            return Err(ScoringError::FeatureMismatch(format!(
                "encoder has {} numeric / {} categorical columns, expected {} / {}",
                encoder.numeric.len(),
                encoder.categorical.len(),
                NUMERIC_FEATURES.len(),
                CATEGORICAL_FEATURES.len()
            )));
        }
        Ok(encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionProfile;

    fn record(region: &str, gender: &str, education: &str) -> BeneficiaryRecord {
        BeneficiaryRecord {
            region: region.to_string(),
            annual_income: 25_000.0,
            is_bpl: true,
            rural: false,
            household_size: 5,
            age: 30.5,
            gender: gender.to_string(),
            education_level: education.to_string(),
            employment_status: "Salaried".to_string(),
            applied_other_scheme_before: false,
            benefited_other_scheme_before: true,
            profile: RegionProfile {
                population_share: 0.08,
                avg_income_per_capita: 54_000.0,
                literacy_rate: 0.62,
                poverty_rate: 0.34,
            },
        }
    }

    fn fitted() -> FeatureEncoder {
        FeatureEncoder::fit(&[
            record("Goa", "Male", "Primary"),
            record("Bihar", "Female", "Graduate"),
            record("Bihar", "Male", "Primary"),
        ])
        .unwrap()
    }

    #[test]
    fn test_vocabulary_sorted_and_deduplicated() {
        let encoder = fitted();
        assert_eq!(encoder.categorical[0].categories, vec!["Bihar", "Goa"]);
        assert_eq!(encoder.categorical[1].categories, vec!["Female", "Male"]);
        assert_eq!(encoder.feature_count(), 11 + 2 + 2 + 2 + 1);
        assert_eq!(encoder.feature_names().len(), encoder.feature_count());
        assert_eq!(encoder.feature_names()[11], "region_Bihar");
    }

    #[test]
    fn test_numeric_passthrough_in_fixed_point() {
        let encoded = fitted().transform(&record("Goa", "Male", "Primary"));
        assert_eq!(encoded[0], 25_000 * SCALE);
        assert_eq!(encoded[1], SCALE);
        assert_eq!(encoded[2], 0);
        assert_eq!(encoded[4], 30_500_000);
        assert_eq!(encoded[6], SCALE);
        assert_eq!(encoded[9], 340_000);
    }

    #[test]
    fn test_one_hot_blocks() {
        let encoded = fitted().transform(&record("Goa", "Female", "Graduate"));
        // region block [Bihar, Goa]
        assert_eq!(&encoded[11..13], &[0, SCALE]);
        // gender block [Female, Male]
        assert_eq!(&encoded[13..15], &[SCALE, 0]);
        // education block [Graduate, Primary]
        assert_eq!(&encoded[15..17], &[SCALE, 0]);
    }

    #[test]
    fn test_unknown_category_encodes_zero_block() {
        let encoder = fitted();
        let encoded = encoder.transform(&record("Atlantis", "Other", "Primary"));
        assert_eq!(encoded.len(), encoder.feature_count());
        assert_eq!(&encoded[11..15], &[0, 0, 0, 0]);
    }

    #[test]
    fn test_fit_requires_rows() {
        assert!(FeatureEncoder::fit(&[]).is_err());
    }

    #[test]
    fn test_persisted_encoder_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoder.json");
        let encoder = fitted();
        encoder.save_json(&path).unwrap();
        assert_eq!(FeatureEncoder::load_json(&path).unwrap(), encoder);
    }
}
