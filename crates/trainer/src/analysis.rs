//! Post-training model analysis
//!
//! Re-applies the training split to a labeled dataset, scores both halves
//! with persisted artifacts and reports RMSE, a generalization verdict,
//! thresholded precision/recall and the numeric correlation matrix.

use pmajay_scoring_core::metrics::{
    pearson_correlation_matrix, rmse, ClassificationMetrics, CorrelationMatrix, GeneralizationCheck,
};
use pmajay_scoring_core::{FeatureEncoder, Model};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::dataset::Dataset;
use crate::errors::Result;

pub const REPORT_FILE: &str = "analysis_report.txt";
pub const CORRELATION_FILE: &str = "correlation_matrix.csv";

#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub train_rmse: f64,
    pub validation_rmse: f64,
    pub generalization: GeneralizationCheck,
    /// Computed on the validation rows
    pub classification: ClassificationMetrics,
    /// Computed on the full dataset
    pub correlation: CorrelationMatrix,
}

pub fn analyze(
    dataset: &Dataset,
    encoder: &FeatureEncoder,
    model: &Model,
    validation_fraction: f64,
    partition_seed: u64,
    threshold: f64,
) -> AnalysisReport {
    let (train, validation) = dataset.split(validation_fraction, partition_seed);
    let predict = |ds: &Dataset| -> Vec<f64> {
        ds.records
            .iter()
            .map(|r| model.predict_unit(&encoder.transform(r)))
            .collect()
    };

    let train_preds = predict(&train);
    let validation_preds = predict(&validation);
    let train_rmse = rmse(&train.labels, &train_preds);
    let validation_rmse = rmse(&validation.labels, &validation_preds);

    AnalysisReport {
        train_rmse,
        validation_rmse,
        generalization: GeneralizationCheck::from_rmse(train_rmse, validation_rmse),
        classification: ClassificationMetrics::at_threshold(
            &validation.labels,
            &validation_preds,
            threshold,
        ),
        correlation: pearson_correlation_matrix(&dataset.numeric_columns()),
    }
}

impl AnalysisReport {
    pub fn render(&self) -> String {
        let c = &self.classification;
        format!(
            "--- Overfitting Check ---\n\
             Train RMSE: {:.4}\n\
             Validation RMSE: {:.4}\n\
             Verdict: {}\n\
             \n\
             --- Classification Metrics (Threshold={}) ---\n\
             Precision: {:.4}\n\
             Recall:    {:.4}\n\
             F1 Score:  {:.4}\n",
            self.train_rmse,
            self.validation_rmse,
            self.generalization,
            c.threshold,
            c.precision,
            c.recall,
            c.f1
        )
    }

    /// Write the text report and the correlation matrix into `dir`
    pub fn write<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        fs::write(dir.join(REPORT_FILE), self.render())?;

        let mut csv = csv::Writer::from_path(dir.join(CORRELATION_FILE))?;
        let mut header = vec![String::new()];
        header.extend(self.correlation.columns.iter().cloned());
        csv.write_record(&header)?;
        for (name, row) in self.correlation.columns.iter().zip(&self.correlation.values) {
            let mut record = vec![name.clone()];
            record.extend(row.iter().map(|v| format!("{v:.4}")));
            csv.write_record(&record)?;
        }
        csv.flush()?;

        info!("Analysis written to {}", dir.display());
        Ok(())
    }
}
