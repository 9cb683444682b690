//! Region reference table
//!
//! One row per administrative region with the socioeconomic indicators used
//! to enrich individual records. Loading is forgiving about cell contents and
//! strict about structure:
//!
//! - header names and region keys are whitespace-trimmed
//! - population columns: unparseable or missing cells become 0
//! - economic columns: unparseable or missing cells become the column mean
//! - an empty key skips the row, a duplicate key rejects the table

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::errors::{InputKind, Result, ScoringError};

const KEY_COLUMNS: &[&str] = &["region", "state"];
const POPULATION_COLUMNS: &[&str] = &["population", "sc_population"];
const SHARE_COLUMNS: &[&str] = &["population_share", "sc_population_share_among_sc"];
const INCOME_COLUMNS: &[&str] = &["avg_income_per_capita"];
const LITERACY_COLUMNS: &[&str] = &["literacy_rate"];
const POVERTY_COLUMNS: &[&str] = &["poverty_rate"];

/// The four region fields copied onto every beneficiary record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionProfile {
    pub population_share: f64,
    pub avg_income_per_capita: f64,
    pub literacy_rate: f64,
    pub poverty_rate: f64,
}

impl RegionProfile {
    /// Enrichment used when a region key is not in the table
    pub const FALLBACK: RegionProfile = RegionProfile {
        population_share: 0.0,
        avg_income_per_capita: 0.0,
        literacy_rate: 0.0,
        poverty_rate: 0.0,
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    pub region_id: String,
    pub population: f64,
    pub profile: RegionProfile,
}

/// Cleaned region table, usable for weighted sampling and point lookup
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    records: Vec<RegionRecord>,
    index: HashMap<String, usize>,
}

impl RegionTable {
    /// Load from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScoringError::missing(InputKind::RegionTable, path));
        }
        info!("Loading region reference table from {}", path.display());
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Load from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let column = |names: &[&str]| headers.iter().position(|h| names.contains(&h.as_str()));

        let key_col = column(KEY_COLUMNS).ok_or_else(|| {
            ScoringError::InvalidRegionTable(format!(
                "no region key column (expected one of {KEY_COLUMNS:?})"
            ))
        })?;
        let population_col = column(POPULATION_COLUMNS);
        let share_col = column(SHARE_COLUMNS);
        let income_col = column(INCOME_COLUMNS);
        let literacy_col = column(LITERACY_COLUMNS);
        let poverty_col = column(POVERTY_COLUMNS);

        struct RawRow {
            key: String,
            population: Option<f64>,
            share: Option<f64>,
            income: Option<f64>,
            literacy: Option<f64>,
            poverty: Option<f64>,
        }

        let mut rows = Vec::new();
        for (line, record) in csv.records().enumerate() {
            let record = record?;
            let cell = |col: Option<usize>| col.and_then(|c| record.get(c)).and_then(parse_number);

            let key = record.get(key_col).unwrap_or("").trim().to_string();
            if key.is_empty() {
                warn!("Skipping region row {}: empty key", line + 2);
                continue;
            }

            rows.push(RawRow {
                key,
                population: cell(population_col),
                share: cell(share_col),
                income: cell(income_col),
                literacy: cell(literacy_col),
                poverty: cell(poverty_col),
            });
        }

        if rows.is_empty() {
            return Err(ScoringError::InvalidRegionTable("table has no regions".to_string()));
        }

        let income_mean = column_mean(rows.iter().map(|r| r.income));
        let literacy_mean = column_mean(rows.iter().map(|r| r.literacy));
        let poverty_mean = column_mean(rows.iter().map(|r| r.poverty));
        debug!(
            income_mean,
            literacy_mean, poverty_mean, "Imputation means for economic columns"
        );

        let mut table = RegionTable::default();
        for row in rows {
            if table.index.contains_key(&row.key) {
                return Err(ScoringError::InvalidRegionTable(format!(
                    "duplicate region '{}'",
                    row.key
                )));
            }
            table.index.insert(row.key.clone(), table.records.len());
            table.records.push(RegionRecord {
                region_id: row.key,
                population: row.population.unwrap_or(0.0),
                profile: RegionProfile {
                    population_share: row.share.unwrap_or(0.0),
                    avg_income_per_capita: row.income.unwrap_or(income_mean),
                    literacy_rate: row.literacy.unwrap_or(literacy_mean),
                    poverty_rate: row.poverty.unwrap_or(poverty_mean),
                },
            });
        }

        info!("Loaded {} regions", table.len());
        Ok(table)
    }

    /// Build directly from records (used by tests and tooling)
    pub fn from_records(records: Vec<RegionRecord>) -> Result<Self> {
        let mut table = RegionTable::default();
        for record in records {
            let key = record.region_id.trim().to_string();
            if table.index.insert(key.clone(), table.records.len()).is_some() {
                return Err(ScoringError::InvalidRegionTable(format!(
                    "duplicate region '{key}'"
                )));
            }
            table.records.push(RegionRecord {
                region_id: key,
                ..record
            });
        }
        Ok(table)
    }

    pub fn get(&self, region: &str) -> Option<&RegionRecord> {
        self.index.get(region.trim()).map(|&i| &self.records[i])
    }

    /// Profile for `region`, or the all-zero fallback when it is unknown
    pub fn profile_or_fallback(&self, region: &str) -> RegionProfile {
        match self.get(region) {
            Some(record) => record.profile,
            None => {
                debug!(region, "Unknown region, using fallback enrichment");
                RegionProfile::FALLBACK
            }
        }
    }

    /// Sampling weight per region, in table order
    pub fn sampling_weights(&self) -> Vec<f64> {
        self.records
            .iter()
            .map(|r| r.profile.population_share)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[RegionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    let cleaned = cell.trim().replace(',', "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn column_mean(values: impl Iterator<Item = Option<f64>>) -> f64 {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
