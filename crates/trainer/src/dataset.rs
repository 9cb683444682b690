//! Labeled beneficiary datasets
//!
//! CSV persistence of synthetic populations, the seeded train/validation
//! partition and conversion into the fixed-point matrix the tree builder
//! consumes.

use pmajay_scoring_core::encoder::{to_fixed, FeatureEncoder};
use pmajay_scoring_core::region::RegionProfile;
use pmajay_scoring_core::{beneficiary::flag, BeneficiaryRecord, InputKind, ScoringError};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

use crate::deterministic::{partition_indices, PARTITION_SEED, VALIDATION_FRACTION};
use crate::errors::{Result, TrainerError};

/// Name of the label column
pub const TARGET_COLUMN: &str = "priority_score";

/// Numeric columns reported by the correlation analysis, label last
pub const ANALYSIS_COLUMNS: [&str; 12] = [
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
    TARGET_COLUMN,
];

/// Flat CSV row: one beneficiary, its region enrichment and its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DatasetRow {
    #[serde(alias = "state")]
    region: String,
    annual_income: f64,
    #[serde(serialize_with = "flag::as_int", deserialize_with = "flag::from_int")]
    is_bpl: bool,
    #[serde(serialize_with = "flag::as_int", deserialize_with = "flag::from_int")]
    rural: bool,
    household_size: u32,
    age: f64,
    gender: String,
    education_level: String,
    employment_status: String,
    #[serde(serialize_with = "flag::as_int", deserialize_with = "flag::from_int")]
    applied_other_scheme_before: bool,
    #[serde(serialize_with = "flag::as_int", deserialize_with = "flag::from_int")]
    benefited_other_scheme_before: bool,
    #[serde(alias = "sc_population_share_among_sc")]
    population_share: f64,
    avg_income_per_capita: f64,
    literacy_rate: f64,
    poverty_rate: f64,
    priority_score: f64,
}

impl DatasetRow {
    fn new(record: &BeneficiaryRecord, label: f64) -> Self {
        Self {
            region: record.region.clone(),
            annual_income: record.annual_income,
            is_bpl: record.is_bpl,
            rural: record.rural,
            household_size: record.household_size,
            age: record.age,
            gender: record.gender.clone(),
            education_level: record.education_level.clone(),
            employment_status: record.employment_status.clone(),
            applied_other_scheme_before: record.applied_other_scheme_before,
            benefited_other_scheme_before: record.benefited_other_scheme_before,
            population_share: record.profile.population_share,
            avg_income_per_capita: record.profile.avg_income_per_capita,
            literacy_rate: record.profile.literacy_rate,
            poverty_rate: record.profile.poverty_rate,
            priority_score: label,
        }
    }

    fn into_parts(self) -> (BeneficiaryRecord, f64) {
        let record = BeneficiaryRecord {
            region: self.region.trim().to_string(),
            annual_income: self.annual_income,
            is_bpl: self.is_bpl,
            rural: self.rural,
            household_size: self.household_size,
            age: self.age,
            gender: self.gender,
            education_level: self.education_level,
            employment_status: self.employment_status,
            applied_other_scheme_before: self.applied_other_scheme_before,
            benefited_other_scheme_before: self.benefited_other_scheme_before,
            profile: RegionProfile {
                population_share: self.population_share,
                avg_income_per_capita: self.avg_income_per_capita,
                literacy_rate: self.literacy_rate,
                poverty_rate: self.poverty_rate,
            },
        };
        (record, self.priority_score)
    }
}

/// Beneficiary records with their priority labels
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    pub records: Vec<BeneficiaryRecord>,
    pub labels: Vec<f64>,
}

impl Dataset {
    pub fn new(records: Vec<BeneficiaryRecord>, labels: Vec<f64>) -> Result<Self> {
        if records.len() != labels.len() {
            return Err(TrainerError::Dataset(format!(
                "{} records but {} labels",
                records.len(),
                labels.len()
            )));
        }
        Ok(Self { records, labels })
    }

    /// Load dataset from CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScoringError::missing(InputKind::Dataset, path).into());
        }
        info!("Loading dataset from {}", path.display());
        Self::from_reader(std::fs::File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut records = Vec::new();
        let mut labels = Vec::new();
        for row in csv.deserialize::<DatasetRow>() {
            let (record, label) = row?.into_parts();
            records.push(record);
            labels.push(label);
        }

        if records.is_empty() {
            return Err(TrainerError::Dataset("Dataset is empty".to_string()));
        }
        Ok(Self { records, labels })
    }

    /// Write as CSV with a header row; flags are written as 0/1
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        for (record, &label) in self.records.iter().zip(&self.labels) {
            csv.serialize(DatasetRow::new(record, label))?;
        }
        csv.flush()?;
        Ok(())
    }

    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.write_csv(std::fs::File::create(path)?)?;
        info!("Saved {} rows to {}", self.len(), path.display());
        Ok(())
    }

    /// Rows at `indices`, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            records: indices.iter().map(|&i| self.records[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Seeded shuffle split into (train, validation)
    pub fn split(&self, validation_fraction: f64, seed: u64) -> (Self, Self) {
        let partition = partition_indices(self.len(), validation_fraction, seed);
        (self.subset(&partition.train), self.subset(&partition.validation))
    }

    /// The conventional 80/20 split
    pub fn default_split(&self) -> (Self, Self) {
        self.split(VALIDATION_FRACTION, PARTITION_SEED)
    }

    /// Encode into a fixed-point feature matrix
    pub fn encode(&self, encoder: &FeatureEncoder) -> EncodedDataset {
        EncodedDataset {
            features: encoder.transform_all(&self.records),
            targets: self.labels.iter().map(|&y| to_fixed(y)).collect(),
            feature_count: encoder.feature_count(),
        }
    }

    /// Named numeric columns for correlation analysis, label last
    pub fn numeric_columns(&self) -> Vec<(String, Vec<f64>)> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let extract = |name: &str, r: &BeneficiaryRecord, label: f64| match name {
            "annual_income" => r.annual_income,
            "is_bpl" => flag(r.is_bpl),
            "rural" => flag(r.rural),
            "household_size" => f64::from(r.household_size),
            "age" => r.age,
            "applied_other_scheme_before" => flag(r.applied_other_scheme_before),
            "benefited_other_scheme_before" => flag(r.benefited_other_scheme_before),
            "avg_income_per_capita" => r.profile.avg_income_per_capita,
            "literacy_rate" => r.profile.literacy_rate,
            "poverty_rate" => r.profile.poverty_rate,
            "population_share" => r.profile.population_share,
            _ => label,
        };

        ANALYSIS_COLUMNS
            .iter()
            .map(|&name| {
                let values = self
                    .records
                    .iter()
                    .zip(&self.labels)
                    .map(|(r, &label)| extract(name, r, label))
                    .collect();
                (name.to_string(), values)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fixed-point training matrix
#[derive(Clone, Debug)]
pub struct EncodedDataset {
    pub features: Vec<Vec<i64>>,
    pub targets: Vec<i64>,
    pub feature_count: usize,
}

impl EncodedDataset {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}
