//! Synthetic beneficiary population
//!
//! Draws a seeded population over a region table and labels it with the
//! priority formula. Columns are drawn one at a time, in a fixed order, from
//! a single ChaCha stream, so a seed fully determines the output.

use pmajay_scoring_core::beneficiary::{
    EDUCATION_LEVELS, EMPLOYMENT_STATUSES, GENDERS, MAX_AGE, MAX_HOUSEHOLD, MAX_INCOME, MIN_AGE,
    MIN_HOUSEHOLD, MIN_INCOME,
};
use pmajay_scoring_core::formula::{priority_label, LabelNoise, PriorityWeights, LABEL_NOISE_STD};
use pmajay_scoring_core::{BeneficiaryRecord, RegionTable};
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution, LogNormal, Normal, Poisson};
use tracing::{info, warn};

use crate::dataset::Dataset;
use crate::deterministic::{seeded_rng, GENERATOR_SEED};
use crate::errors::{Result, TrainerError};

const INCOME_LOG_MEAN: f64 = 11.0;
const INCOME_LOG_SIGMA: f64 = 0.8;
const BPL_RATE: f64 = 0.55;
const RURAL_RATE: f64 = 0.68;
const HOUSEHOLD_MEAN: f64 = 4.3;
const AGE_MEAN: f64 = 36.0;
const AGE_STD: f64 = 12.0;
const EDUCATION_WEIGHTS: [f64; 4] = [0.2, 0.3, 0.3, 0.2];
const EMPLOYMENT_WEIGHTS: [f64; 4] = [0.25, 0.35, 0.25, 0.15];
const APPLIED_RATE: f64 = 0.28;
const BENEFITED_RATE: f64 = 0.12;

/// Generator configuration
#[derive(Clone, Debug)]
pub struct GeneratorConfig {
    pub num_samples: usize,
    pub seed: u64,
    pub weights: PriorityWeights,
    pub noise_std: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_samples: 10_000,
            seed: GENERATOR_SEED,
            weights: PriorityWeights::default(),
            noise_std: LABEL_NOISE_STD,
        }
    }
}

pub struct PopulationGenerator {
    config: GeneratorConfig,
}

fn invalid(what: &str, err: impl std::fmt::Display) -> TrainerError {
    TrainerError::Generation(format!("{what}: {err}"))
}

impl PopulationGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Draw `num_samples` labeled records over `regions`
    pub fn generate(&self, regions: &RegionTable) -> Result<Dataset> {
        if regions.is_empty() {
            return Err(TrainerError::Generation(
                "region table has no rows to sample from".to_string(),
            ));
        }

        let n = self.config.num_samples;
        info!(samples = n, seed = self.config.seed, "Synthesizing beneficiaries");
        let mut rng = seeded_rng(self.config.seed);

        // Region assignment
        let weights = regions.sampling_weights();
        if weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
            return Err(TrainerError::Generation(
                "population shares must be finite and non-negative".to_string(),
            ));
        }
        let region_idx: Vec<usize> = if weights.iter().sum::<f64>() > 0.0 {
            let dist = WeightedIndex::new(&weights).map_err(|e| invalid("region weights", e))?;
            (0..n).map(|_| dist.sample(&mut rng)).collect()
        } else {
            warn!("All population shares are zero, sampling regions uniformly");
            (0..n).map(|_| rng.gen_range(0..regions.len())).collect()
        };

        let income_dist =
            LogNormal::new(INCOME_LOG_MEAN, INCOME_LOG_SIGMA).map_err(|e| invalid("income", e))?;
        let income: Vec<f64> = (0..n)
            .map(|_| income_dist.sample(&mut rng).clamp(MIN_INCOME, MAX_INCOME))
            .collect();

        let is_bpl = bernoulli_column(&mut rng, BPL_RATE, n)?;
        let rural = bernoulli_column(&mut rng, RURAL_RATE, n)?;

        let household_dist = Poisson::new(HOUSEHOLD_MEAN).map_err(|e| invalid("household", e))?;
        let household: Vec<u32> = (0..n)
            .map(|_| {
                let draw: f64 = household_dist.sample(&mut rng);
                (draw as u32).clamp(MIN_HOUSEHOLD, MAX_HOUSEHOLD)
            })
            .collect();

        let age_dist = Normal::new(AGE_MEAN, AGE_STD).map_err(|e| invalid("age", e))?;
        let age: Vec<f64> = (0..n)
            .map(|_| age_dist.sample(&mut rng).clamp(MIN_AGE, MAX_AGE))
            .collect();

        let gender: Vec<&str> = (0..n)
            .map(|_| GENDERS[rng.gen_range(0..GENDERS.len())])
            .collect();
        let education = categorical_column(&mut rng, &EDUCATION_LEVELS, &EDUCATION_WEIGHTS, n)?;
        let employment = categorical_column(&mut rng, &EMPLOYMENT_STATUSES, &EMPLOYMENT_WEIGHTS, n)?;

        let applied = bernoulli_column(&mut rng, APPLIED_RATE, n)?;
        let benefited = bernoulli_column(&mut rng, BENEFITED_RATE, n)?;

        let region_rows = regions.records();
        let records: Vec<BeneficiaryRecord> = (0..n)
            .map(|i| {
                let region = &region_rows[region_idx[i]];
                BeneficiaryRecord {
                    region: region.region_id.clone(),
                    annual_income: income[i],
                    is_bpl: is_bpl[i],
                    rural: rural[i],
                    household_size: household[i],
                    age: age[i],
                    gender: gender[i].to_string(),
                    education_level: education[i].to_string(),
                    employment_status: employment[i].to_string(),
                    applied_other_scheme_before: applied[i],
                    benefited_other_scheme_before: benefited[i],
                    profile: region.profile,
                }
            })
            .collect();

        let noise = LabelNoise::new(self.config.noise_std)?;
        let labels: Vec<f64> = records
            .iter()
            .map(|r| priority_label(r, &self.config.weights, noise.sample(&mut rng)))
            .collect();

        Dataset::new(records, labels)
    }
}

fn bernoulli_column<R: Rng>(rng: &mut R, p: f64, n: usize) -> Result<Vec<bool>> {
    let dist = Bernoulli::new(p).map_err(|e| invalid("bernoulli rate", e))?;
    Ok((0..n).map(|_| dist.sample(&mut *rng)).collect())
}

fn categorical_column<R: Rng>(
    rng: &mut R,
    values: &[&'static str],
    weights: &[f64],
    n: usize,
) -> Result<Vec<&'static str>> {
    let dist = WeightedIndex::new(weights).map_err(|e| invalid("category weights", e))?;
    Ok((0..n).map(|_| values[dist.sample(&mut *rng)]).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmajay_scoring_core::{RegionProfile, RegionRecord};

    fn regions(shares: &[f64]) -> RegionTable {
        RegionTable::from_records(
            shares
                .iter()
                .enumerate()
                .map(|(i, &share)| RegionRecord {
                    region_id: format!("R{i}"),
                    population: 1000.0,
                    profile: RegionProfile {
                        population_share: share,
                        avg_income_per_capita: 100_000.0,
                        literacy_rate: 0.7,
                        poverty_rate: 0.2,
                    },
                })
                .collect(),
        )
        .unwrap()
    }

    fn generate(n: usize, seed: u64, table: &RegionTable) -> Dataset {
        PopulationGenerator::new(GeneratorConfig {
            num_samples: n,
            seed,
            ..GeneratorConfig::default()
        })
        .generate(table)
        .unwrap()
    }

    #[test]
    fn test_fields_within_bounds() {
        let ds = generate(2_000, GENERATOR_SEED, &regions(&[0.3, 0.7]));
        assert_eq!(ds.len(), 2_000);
        for (r, &label) in ds.records.iter().zip(&ds.labels) {
            assert!((MIN_INCOME..=MAX_INCOME).contains(&r.annual_income));
            assert!((MIN_HOUSEHOLD..=MAX_HOUSEHOLD).contains(&r.household_size));
            assert!((MIN_AGE..=MAX_AGE).contains(&r.age));
            assert!(GENDERS.contains(&r.gender.as_str()));
            assert!(EDUCATION_LEVELS.contains(&r.education_level.as_str()));
            assert!(EMPLOYMENT_STATUSES.contains(&r.employment_status.as_str()));
            assert!((0.0..=1.0).contains(&label));
        }
    }

    #[test]
    fn test_same_seed_same_population() {
        let table = regions(&[0.5, 0.5]);
        assert_eq!(generate(300, 5, &table), generate(300, 5, &table));
        assert_ne!(generate(300, 5, &table), generate(300, 6, &table));
    }

    #[test]
    fn test_zero_shares_sample_uniformly() {
        let ds = generate(3_000, GENERATOR_SEED, &regions(&[0.0, 0.0, 0.0]));
        for region in ["R0", "R1", "R2"] {
            let count = ds.records.iter().filter(|r| r.region == region).count();
            assert!((800..1200).contains(&count), "{region}: {count}");
        }
    }

    #[test]
    fn test_zero_share_region_never_drawn() {
        let ds = generate(1_000, GENERATOR_SEED, &regions(&[1.0, 0.0]));
        assert!(ds.records.iter().all(|r| r.region == "R0"));
    }

    #[test]
    fn test_records_carry_region_profile() {
        let ds = generate(50, GENERATOR_SEED, &regions(&[1.0]));
        assert!(ds.records.iter().all(|r| r.profile.poverty_rate == 0.2));
    }

    #[test]
    fn test_empty_table_rejected() {
        let generator = PopulationGenerator::new(GeneratorConfig::default());
        assert!(generator.generate(&RegionTable::default()).is_err());
    }
}
