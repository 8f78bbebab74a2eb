//! Backtest classification metrics.
//!
//! Accuracy, precision, and recall are computed once over the concatenation
//! of every fold's held-out predictions, never averaged per period.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One held-out prediction from a backtest fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub client_id: i64,
    pub period: NaiveDate,
    pub actual: u8,
    pub predicted: u8,
}

/// The backtest report.
///
/// A zero denominator (no positive predictions for precision, no positive
/// actuals for recall, no records at all for accuracy) yields `f64::NAN`
/// rather than an error, so the report always completes. Check
/// [`BacktestMetrics::is_degenerate`] before comparing runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub model: String,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

impl BacktestMetrics {
    /// Compute metrics over the full concatenation of fold records.
    pub fn from_records(model: String, records: &[PredictionRecord]) -> Self {
        let total = records.len() as f64;
        let correct = records.iter().filter(|r| r.actual == r.predicted).count() as f64;
        let true_positives = records
            .iter()
            .filter(|r| r.actual == 1 && r.predicted == 1)
            .count() as f64;
        let false_positives = records
            .iter()
            .filter(|r| r.actual != 1 && r.predicted == 1)
            .count() as f64;
        let false_negatives = records
            .iter()
            .filter(|r| r.actual == 1 && r.predicted != 1)
            .count() as f64;

        Self {
            model,
            accuracy: correct / total,
            precision: true_positives / (true_positives + false_positives),
            recall: true_positives / (true_positives + false_negatives),
        }
    }

    /// True when any metric has a zero denominator.
    pub fn is_degenerate(&self) -> bool {
        self.accuracy.is_nan() || self.precision.is_nan() || self.recall.is_nan()
    }

    /// One-line report for logs and the console.
    pub fn summary(&self) -> String {
        format!(
            "model: {} | accuracy: {:.4} | precision: {:.4} | recall: {:.4}",
            self.model, self.accuracy, self.precision, self.recall
        )
    }
}
