//! Synthetic priority label
//!
//! Deterministic weighted sum over a fully populated record, plus Gaussian
//! noise, clipped to [0, 1]. This is the ground truth the trainer fits; the
//! serving path never calls it.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::beneficiary::{BeneficiaryRecord, MAX_INCOME};
use crate::errors::{Result, ScoringError};

/// Standard deviation of the label noise
pub const LABEL_NOISE_STD: f64 = 0.15;

/// Term weights of the label formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriorityWeights {
    pub income: f64,
    pub bpl: f64,
    pub rural: f64,
    pub female: f64,
    pub poverty: f64,
    pub illiteracy: f64,
    pub overlap_penalty: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            income: 0.4,
            bpl: 0.6,
            rural: 0.4,
            female: 1.0,
            poverty: 0.6,
            illiteracy: 0.4,
            overlap_penalty: 0.4,
        }
    }
}

/// Noise-free weighted sum, unclipped
pub fn raw_priority(record: &BeneficiaryRecord, weights: &PriorityWeights) -> f64 {
    let indicator = |flag: bool| if flag { 1.0 } else { 0.0 };

    let income = (1.0 - record.annual_income / MAX_INCOME) * weights.income;
    let bpl = indicator(record.is_bpl) * weights.bpl;
    let rural = indicator(record.rural) * weights.rural;
    let female = indicator(record.is_female()) * weights.female;
    let poverty = record.profile.poverty_rate * weights.poverty;
    let illiteracy = (1.0 - record.profile.literacy_rate) * weights.illiteracy;
    let overlap = indicator(record.benefited_other_scheme_before) * weights.overlap_penalty;

    income + bpl + rural + female + poverty + illiteracy - overlap
}

/// Clip a score into the unit interval
pub fn clip_unit(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

/// Gaussian label noise source
#[derive(Debug, Clone, Copy)]
pub struct LabelNoise {
    dist: Normal<f64>,
}

impl LabelNoise {
    pub fn new(std_dev: f64) -> Result<Self> {
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(ScoringError::InvalidParameters(format!(
                "label noise std must be finite and non-negative (got {std_dev})"
            )));
        }
        let dist = Normal::new(0.0, std_dev)
            .map_err(|e| ScoringError::InvalidParameters(format!("label noise: {e}")))?;
        Ok(Self { dist })
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.dist.sample(rng)
    }
}

/// Label for one record given an already drawn noise value
pub fn priority_label(record: &BeneficiaryRecord, weights: &PriorityWeights, noise: f64) -> f64 {
    clip_unit(raw_priority(record, weights) + noise)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionProfile;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn record(income: f64) -> BeneficiaryRecord {
        BeneficiaryRecord {
            region: "Goa".to_string(),
            annual_income: income,
            is_bpl: false,
            rural: false,
            household_size: 3,
            age: 40.0,
            gender: "Male".to_string(),
            education_level: "Graduate".to_string(),
            employment_status: "Salaried".to_string(),
            applied_other_scheme_before: false,
            benefited_other_scheme_before: false,
            profile: RegionProfile {
                population_share: 0.0,
                avg_income_per_capita: 470_000.0,
                literacy_rate: 0.9,
                poverty_rate: 0.05,
            },
        }
    }

    #[test]
    fn test_known_terms() {
        let weights = PriorityWeights::default();
        let r = record(150_000.0);
        // 0.5*0.4 + 0.05*0.6 + 0.1*0.4
        assert!((raw_priority(&r, &weights) - 0.27).abs() < 1e-12);

        let mut flagged = r.clone();
        flagged.is_bpl = true;
        flagged.rural = true;
        flagged.benefited_other_scheme_before = true;
        assert!((raw_priority(&flagged, &weights) - (0.27 + 0.6 + 0.4 - 0.4)).abs() < 1e-12);
    }

    #[test]
    fn test_female_term_unscaled() {
        let weights = PriorityWeights::default();
        let male = record(150_000.0);
        let mut female = male.clone();
        female.gender = "Female".to_string();
        let diff = raw_priority(&female, &weights) - raw_priority(&male, &weights);
        assert!((diff - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_noise_is_seeded() {
        let noise = LabelNoise::new(LABEL_NOISE_STD).unwrap();
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..32 {
            assert_eq!(noise.sample(&mut a), noise.sample(&mut b));
        }
    }

    #[test]
    fn test_negative_noise_std_rejected() {
        assert!(matches!(
            LabelNoise::new(-1.0),
            Err(ScoringError::InvalidParameters(_))
        ));
        assert!(LabelNoise::new(f64::NAN).is_err());
        assert!(LabelNoise::new(0.0).is_ok());
    }

    proptest! {
        #[test]
        fn label_always_in_unit_interval(
            income in 20_000.0f64..=300_000.0,
            noise in -3.0f64..3.0,
            bpl: bool,
            rural: bool,
            benefited: bool,
        ) {
            let mut r = record(income);
            r.is_bpl = bpl;
            r.rural = rural;
            r.benefited_other_scheme_before = benefited;
            let label = priority_label(&r, &PriorityWeights::default(), noise);
            prop_assert!((0.0..=1.0).contains(&label));
        }

        #[test]
        fn raw_score_non_increasing_in_income(
            low in 20_000.0f64..=300_000.0,
            delta in 0.0f64..100_000.0,
        ) {
            let high = (low + delta).min(300_000.0);
            let weights = PriorityWeights::default();
            prop_assert!(raw_priority(&record(high), &weights) <= raw_priority(&record(low), &weights));
        }
    }
}
