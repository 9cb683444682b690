//! Integration tests for generation and deterministic training
//!
//! Ensures identical datasets and models are produced across runs and
//! that a trained model ranks a high-poverty region above a low-poverty one.

use anyhow::Result;
use pmajay_scoring_core::explain::attribute;
use pmajay_scoring_core::{ArtifactPaths, BeneficiaryInput, RegionTable, ServingContext};
use pmajay_trainer::pipeline::{HASH_FILE, IMPORTANCE_FILE, METRICS_FILE};
use pmajay_trainer::{
    train_pipeline, Dataset, GeneratorConfig, PipelineConfig, PopulationGenerator, TrainingParams,
};
use std::fs;
use std::path::Path;

const REGIONS: &str = "\
state,sc_population,sc_population_share_among_sc,avg_income_per_capita,literacy_rate,poverty_rate
Bihar,16567325,0.082,54000,0.61,0.34
Goa,25449,0.0001,470000,0.88,0.05
Karnataka,10474992,0.052,230000,0.75,0.13
Uttar Pradesh,41357608,0.206,74000,0.67,0.29
Kerala,3039573,0.015,210000,0.94,0.01
";

fn regions() -> Result<RegionTable> {
    Ok(RegionTable::from_reader(REGIONS.as_bytes())?)
}

fn generate(samples: usize, seed: u64) -> Result<Dataset> {
    let config = GeneratorConfig {
        num_samples: samples,
        seed,
        ..GeneratorConfig::default()
    };
    Ok(PopulationGenerator::new(config).generate(&regions()?)?)
}

fn csv_bytes(dataset: &Dataset) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    dataset.write_csv(&mut bytes)?;
    Ok(bytes)
}

fn small_config() -> PipelineConfig {
    PipelineConfig {
        params: TrainingParams {
            num_trees: 20,
            max_depth: 4,
            ..TrainingParams::default()
        },
        ..PipelineConfig::default()
    }
}

#[test]
fn test_generation_is_byte_identical() -> Result<()> {
    let first = csv_bytes(&generate(500, 67)?)?;
    let second = csv_bytes(&generate(500, 67)?)?;
    assert_eq!(first, second);

    let other = csv_bytes(&generate(500, 68)?)?;
    assert_ne!(first, other);
    Ok(())
}

#[test]
fn test_csv_file_roundtrip() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("synthetic.csv");
    let dataset = generate(200, 67)?;
    dataset.to_csv(&path)?;
    assert_eq!(Dataset::from_csv(&path)?, dataset);
    Ok(())
}

#[test]
fn test_deterministic_training() -> Result<()> {
    let dataset = generate(600, 67)?;
    let first = train_pipeline(&dataset, &small_config())?;
    let second = train_pipeline(&dataset, &small_config())?;

    assert_eq!(first.model, second.model);
    assert_eq!(first.encoder, second.encoder);
    assert_eq!(first.report.model_hash, second.report.model_hash);
    assert_eq!(first.report.validation_samples, 120);
    assert_eq!(first.report.train_samples, 480);
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    Ok(fs::read_to_string(path)?)
}

#[test]
fn test_artifacts_written() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let outcome = train_pipeline(&generate(400, 67)?, &small_config())?;
    let files = outcome.write_artifacts(dir.path())?;

    assert_eq!(read(&dir.path().join(HASH_FILE))?, outcome.report.model_hash);
    assert!(read(&files.model)?.starts_with("{\"bias\":"));
    assert!(read(&dir.path().join(IMPORTANCE_FILE))?.starts_with("Feature,Importance\n"));
    assert!(read(&dir.path().join(METRICS_FILE))?.starts_with("Train RMSE: "));
    Ok(())
}

#[test]
fn test_end_to_end_bihar_above_goa() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let regions_path = dir.path().join("regions.csv");
    fs::write(&regions_path, REGIONS)?;

    let outcome = train_pipeline(&generate(10_000, 67)?, &PipelineConfig::default())?;
    assert!(outcome.report.validation_rmse < 0.3);
    outcome.write_artifacts(dir.path())?;

    let context = ServingContext::load(&ArtifactPaths::in_dir(&regions_path, dir.path()))?;
    let goa_input: BeneficiaryInput = serde_json::from_str(
        r#"{"region":"Goa","annual_income":250000,"is_bpl":0,"rural":0}"#,
    )?;
    let bihar_input: BeneficiaryInput = serde_json::from_str(
        r#"{"region":"Bihar","annual_income":25000,"is_bpl":1,"rural":1}"#,
    )?;
    let goa = context.predict(&goa_input)?;
    let bihar = context.predict(&bihar_input)?;
    assert!(goa.score < bihar.score, "Goa {} should rank below Bihar {}", goa.score, bihar.score);

    let explanation = context.explain(&goa_input)?;
    assert!(!explanation.factors.is_empty());
    for pair in explanation.factors.windows(2) {
        assert!(pair[0].value.abs() >= pair[1].value.abs());
    }

    let model = context.model();
    let names = context.encoder().feature_names();
    let tolerance = model.num_trees() as f64 * 1e-6 + 1e-9;
    for input in [&goa_input, &bihar_input] {
        let features = context.encoder().transform(&context.resolve(input));
        let attribution = attribute(model, &features, &names);
        let raw = model.predict_raw(&features);
        assert!(
            (attribution.total() - raw).abs() <= tolerance,
            "attribution total {} drifted from raw score {}",
            attribution.total(),
            raw
        );
    }
    Ok(())
}
