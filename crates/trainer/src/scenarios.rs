//! Paired what-if comparisons
//!
//! Each case scores two requests that differ in a single attribute over a
//! shared base profile and reports which side the model favours.

use pmajay_scoring_core::{BeneficiaryInput, ServingContext};
use serde::Serialize;
use tracing::info;

use crate::errors::Result;

/// One paired comparison
#[derive(Debug, Clone)]
pub struct ComparisonCase {
    pub name: &'static str,
    pub label_a: &'static str,
    pub label_b: &'static str,
    pub a: BeneficiaryInput,
    pub b: BeneficiaryInput,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutcome {
    pub name: String,
    pub label_a: String,
    pub label_b: String,
    pub score_a: f64,
    pub score_b: f64,
}

impl ComparisonOutcome {
    /// `score_a - score_b`
    pub fn difference(&self) -> f64 {
        self.score_a - self.score_b
    }

    pub fn verdict(&self) -> String {
        let diff = self.difference();
        if diff > 0.0 {
            format!("{} is favoured by {:.4}", self.label_a, diff)
        } else if diff < 0.0 {
            format!("{} is favoured by {:.4}", self.label_b, -diff)
        } else {
            "Equal".to_string()
        }
    }
}

fn person(region: &str, income: f64, is_bpl: bool, rural: bool) -> BeneficiaryInput {
    BeneficiaryInput {
        annual_income: Some(income),
        is_bpl: Some(is_bpl),
        rural: Some(rural),
        age: Some(35.0),
        gender: Some("Male".to_string()),
        education_level: Some("Primary".to_string()),
        employment_status: Some("Casual Labor".to_string()),
        household_size: Some(5),
        ..BeneficiaryInput::for_region(region)
    }
}

/// The standard four cases
pub fn standard_cases() -> Vec<ComparisonCase> {
    vec![
        ComparisonCase {
            name: "Region dominance",
            label_a: "Poor in Bihar",
            label_b: "Poor in Goa",
            a: person("Bihar", 30_000.0, true, true),
            b: person("Goa", 30_000.0, true, true),
        },
        ComparisonCase {
            name: "BPL impact",
            label_a: "BPL card holder",
            label_b: "Non-BPL",
            a: person("Karnataka", 45_000.0, true, true),
            b: person("Karnataka", 45_000.0, false, true),
        },
        ComparisonCase {
            name: "Income sensitivity",
            label_a: "Income 40k",
            label_b: "Income 45k",
            a: person("Karnataka", 40_000.0, true, true),
            b: person("Karnataka", 45_000.0, true, true),
        },
        ComparisonCase {
            name: "Rural preference",
            label_a: "Rural resident",
            label_b: "Urban resident",
            a: person("Karnataka", 40_000.0, true, true),
            b: person("Karnataka", 40_000.0, true, false),
        },
    ]
}

pub fn run_comparisons(
    context: &ServingContext,
    cases: &[ComparisonCase],
) -> Result<Vec<ComparisonOutcome>> {
    cases
        .iter()
        .map(|case| -> Result<ComparisonOutcome> {
            let outcome = ComparisonOutcome {
                name: case.name.to_string(),
                label_a: case.label_a.to_string(),
                label_b: case.label_b.to_string(),
                score_a: context.predict(&case.a)?.score,
                score_b: context.predict(&case.b)?.score,
            };
            info!(
                "{}: {} {:.4} vs {} {:.4} -> {}",
                outcome.name,
                outcome.label_a,
                outcome.score_a,
                outcome.label_b,
                outcome.score_b,
                outcome.verdict()
            );
            Ok(outcome)
        })
        .collect()
}
