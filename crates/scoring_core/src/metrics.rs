//! Offline evaluation helpers
//!
//! Regression error, thresholded classification quality and a Pearson
//! correlation matrix. None of these run on the serving path.

use serde::Serialize;
use std::fmt;

/// Default cut-off separating "high priority" from the rest
pub const HIGH_PRIORITY_THRESHOLD: f64 = 0.7;

/// Gap above which validation error is flagged as overfitting
pub const OVERFIT_GAP: f64 = 0.05;

/// Gap below which validation error is noted as lower than training
pub const UNDERFIT_GAP: f64 = -0.01;

/// Root mean squared error; 0 for empty input
pub fn rmse(truth: &[f64], predicted: &[f64]) -> f64 {
    let n = truth.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let sse: f64 = truth
        .iter()
        .zip(predicted)
        .map(|(t, p)| (t - p) * (t - p))
        .sum();
    (sse / n as f64).sqrt()
}

/// Precision, recall and F1 of `score >= threshold` as the positive class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub threshold: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ClassificationMetrics {
    pub fn at_threshold(truth: &[f64], predicted: &[f64], threshold: f64) -> Self {
        let (mut tp, mut fp, mut fneg) = (0usize, 0usize, 0usize);
        for (t, p) in truth.iter().zip(predicted) {
            match (*t >= threshold, *p >= threshold) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fneg += 1,
                (false, false) => {}
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fneg);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Self {
            threshold,
            precision,
            recall,
            f1,
            true_positives: tp,
            false_positives: fp,
            false_negatives: fneg,
        }
    }
}

/// Verdict on the validation/train RMSE gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GeneralizationCheck {
    PossibleOverfit,
    ValidationBelowTrain,
    Generalizes,
}

impl GeneralizationCheck {
    pub fn from_rmse(train_rmse: f64, validation_rmse: f64) -> Self {
        let gap = validation_rmse - train_rmse;
        if gap > OVERFIT_GAP {
            GeneralizationCheck::PossibleOverfit
        } else if gap < UNDERFIT_GAP {
            GeneralizationCheck::ValidationBelowTrain
        } else {
            GeneralizationCheck::Generalizes
        }
    }
}

impl fmt::Display for GeneralizationCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            GeneralizationCheck::PossibleOverfit => "possible overfitting (validation error well above train)",
            GeneralizationCheck::ValidationBelowTrain => "validation error below train error",
            GeneralizationCheck::Generalizes => "model generalizes well",
        };
        f.write_str(text)
    }
}

/// Pearson correlation between two equal-length columns
///
/// A constant column has no defined correlation and yields 0.
pub fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let mean = |xs: &[f64]| xs[..n].iter().sum::<f64>() / n as f64;
    let (ma, mb) = (mean(a), mean(b));

    let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
    for (x, y) in a[..n].iter().zip(&b[..n]) {
        let (dx, dy) = (x - ma, y - mb);
        cov += dx * dy;
        va += dx * dx;
        vb += dy * dy;
    }

    if va == 0.0 || vb == 0.0 {
        0.0
    } else {
        cov / (va.sqrt() * vb.sqrt())
    }
}

/// Named square correlation matrix
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: &str, col: &str) -> Option<f64> {
        let r = self.columns.iter().position(|c| c == row)?;
        let c = self.columns.iter().position(|c2| c2 == col)?;
        Some(self.values[r][c])
    }
}

pub fn pearson_correlation_matrix(columns: &[(String, Vec<f64>)]) -> CorrelationMatrix {
    let values = columns
        .iter()
        .map(|(_, a)| columns.iter().map(|(_, b)| pearson(a, b)).collect())
        .collect();
    CorrelationMatrix {
        columns: columns.iter().map(|(name, _)| name.clone()).collect(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmse() {
        assert_eq!(rmse(&[], &[]), 0.0);
        assert!((rmse(&[1.0, 0.0], &[0.0, 0.0]) - (0.5f64).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_classification_at_threshold() {
        let truth = [0.9, 0.8, 0.2, 0.75, 0.1];
        let predicted = [0.95, 0.5, 0.8, 0.7, 0.0];
        let m = ClassificationMetrics::at_threshold(&truth, &predicted, HIGH_PRIORITY_THRESHOLD);
        assert_eq!((m.true_positives, m.false_positives, m.false_negatives), (2, 1, 1));
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((m.f1 - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_positives_yield_zero() {
        let m = ClassificationMetrics::at_threshold(&[0.1, 0.2], &[0.3, 0.1], 0.7);
        assert_eq!((m.precision, m.recall, m.f1), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_generalization_check() {
        assert_eq!(GeneralizationCheck::from_rmse(0.10, 0.20), GeneralizationCheck::PossibleOverfit);
        assert_eq!(GeneralizationCheck::from_rmse(0.15, 0.10), GeneralizationCheck::ValidationBelowTrain);
        assert_eq!(GeneralizationCheck::from_rmse(0.15, 0.16), GeneralizationCheck::Generalizes);
    }

    #[test]
    fn test_correlation_matrix() {
        let columns = vec![
            ("x".to_string(), vec![1.0, 2.0, 3.0, 4.0]),
            ("neg".to_string(), vec![8.0, 6.0, 4.0, 2.0]),
            ("flat".to_string(), vec![5.0; 4]),
        ];
        let matrix = pearson_correlation_matrix(&columns);
        assert!((matrix.get("x", "x").unwrap() - 1.0).abs() < 1e-12);
        assert!((matrix.get("x", "neg").unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(matrix.get("flat", "x"), Some(0.0));
        assert_eq!(matrix.get("x", "missing"), None);
    }
}
