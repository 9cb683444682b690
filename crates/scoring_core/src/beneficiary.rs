//! Beneficiary records and request-time merging
//!
//! A [`BeneficiaryRecord`] is fully populated: every personal field plus the
//! enrichment profile of its region. A [`BeneficiaryInput`] is what arrives
//! at the serving boundary: a region key and any subset of personal fields.
//! [`BeneficiaryInput::resolve`] merges them with fixed precedence
//! (user input > region enrichment > [`BeneficiaryDefaults`]).

use serde::{Deserialize, Deserializer, Serialize};

use crate::region::{RegionProfile, RegionTable};

pub const MIN_INCOME: f64 = 20_000.0;
pub const MAX_INCOME: f64 = 300_000.0;
pub const MIN_HOUSEHOLD: u32 = 1;
pub const MAX_HOUSEHOLD: u32 = 10;
pub const MIN_AGE: f64 = 18.0;
pub const MAX_AGE: f64 = 75.0;

pub const GENDERS: [&str; 2] = ["Male", "Female"];
pub const EDUCATION_LEVELS: [&str; 4] = ["None", "Primary", "Secondary", "Graduate"];
pub const EMPLOYMENT_STATUSES: [&str; 4] =
    ["Unemployed", "Casual Labor", "Self Employed", "Salaried"];

/// One fully populated individual
#[derive(Debug, Clone, PartialEq)]
pub struct BeneficiaryRecord {
    pub region: String,
    pub annual_income: f64,
    pub is_bpl: bool,
    pub rural: bool,
    pub household_size: u32,
    pub age: f64,
    pub gender: String,
    pub education_level: String,
    pub employment_status: String,
    pub applied_other_scheme_before: bool,
    pub benefited_other_scheme_before: bool,
    pub profile: RegionProfile,
}

impl BeneficiaryRecord {
    pub fn is_female(&self) -> bool {
        self.gender == "Female"
    }
}

/// Personal-field values used when a request leaves them out
#[derive(Debug, Clone, PartialEq)]
pub struct BeneficiaryDefaults {
    pub annual_income: f64,
    pub is_bpl: bool,
    pub rural: bool,
    pub household_size: u32,
    pub age: f64,
    pub gender: String,
    pub education_level: String,
    pub employment_status: String,
    pub applied_other_scheme_before: bool,
    pub benefited_other_scheme_before: bool,
}

impl Default for BeneficiaryDefaults {
    fn default() -> Self {
        Self {
            annual_income: 60_000.0,
            is_bpl: true,
            rural: true,
            household_size: 4,
            age: 36.0,
            gender: "Male".to_string(),
            education_level: "Secondary".to_string(),
            employment_status: "Casual Labor".to_string(),
            applied_other_scheme_before: false,
            benefited_other_scheme_before: false,
        }
    }
}

/// A scoring request: mandatory region, optional personal fields
///
/// Flags accept either JSON booleans or the integers 0/1.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeneficiaryInput {
    #[serde(alias = "state")]
    pub region: String,
    #[serde(default)]
    pub annual_income: Option<f64>,
    #[serde(default, deserialize_with = "flag::optional")]
    pub is_bpl: Option<bool>,
    #[serde(default, deserialize_with = "flag::optional")]
    pub rural: Option<bool>,
    #[serde(default)]
    pub household_size: Option<u32>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub education_level: Option<String>,
    #[serde(default)]
    pub employment_status: Option<String>,
    #[serde(default, deserialize_with = "flag::optional")]
    pub applied_other_scheme_before: Option<bool>,
    #[serde(default, deserialize_with = "flag::optional")]
    pub benefited_other_scheme_before: Option<bool>,
}

impl BeneficiaryInput {
    pub fn for_region(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// Merge with region enrichment and defaults into a complete record
    pub fn resolve(&self, regions: &RegionTable, defaults: &BeneficiaryDefaults) -> BeneficiaryRecord {
        let region = self.region.trim().to_string();
        let profile = regions.profile_or_fallback(&region);

        BeneficiaryRecord {
            annual_income: self.annual_income.unwrap_or(defaults.annual_income),
            is_bpl: self.is_bpl.unwrap_or(defaults.is_bpl),
            rural: self.rural.unwrap_or(defaults.rural),
            household_size: self.household_size.unwrap_or(defaults.household_size),
            age: self.age.unwrap_or(defaults.age),
            gender: pick(&self.gender, &defaults.gender),
            education_level: pick(&self.education_level, &defaults.education_level),
            employment_status: pick(&self.employment_status, &defaults.employment_status),
            applied_other_scheme_before: self
                .applied_other_scheme_before
                .unwrap_or(defaults.applied_other_scheme_before),
            benefited_other_scheme_before: self
                .benefited_other_scheme_before
                .unwrap_or(defaults.benefited_other_scheme_before),
            profile,
            region,
        }
    }
}

fn pick(value: &Option<String>, default: &str) -> String {
    value.clone().unwrap_or_else(|| default.to_string())
}

/// Serde helpers for 0/1-or-bool flags
pub mod flag {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Bool(bool),
        Int(i64),
    }

    pub fn optional<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Bool(b)) => Ok(Some(b)),
            Some(Repr::Int(0)) => Ok(Some(false)),
            Some(Repr::Int(1)) => Ok(Some(true)),
            Some(Repr::Int(other)) => Err(serde::de::Error::custom(format!(
                "flag must be 0, 1, true or false (got {other})"
            ))),
        }
    }

    /// Write flags as 0/1 in tabular outputs
    pub fn as_int<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(u8::from(*value))
    }

    /// Read a flag cell written as 0/1 or true/false
    pub fn from_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.trim() {
            "1" | "true" | "True" => Ok(true),
            "0" | "false" | "False" => Ok(false),
            other => Err(serde::de::Error::custom(format!("invalid flag '{other}'"))),
        }
    }
}
