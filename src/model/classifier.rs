//! The classifier capability consumed by the backtest engine.
//!
//! The engine never names a model family; it needs exactly three
//! operations. Any implementation can be substituted without touching the
//! engine. Fit and predict are not assumed reentrant, so a classifier is
//! held behind exclusive access and refit from scratch per fold.

use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::dataset::{TestRow, TrainingRow};
use crate::error::{PipelineError, Result};

/// Minimal fit/predict contract for a binary churn classifier.
///
/// Inputs are borrowed views so implementations never force a copy of the
/// fold matrices.
pub trait Classifier {
    /// Fit on a feature matrix and its 0/1 label vector, discarding any
    /// previously fitted state.
    fn fit(&mut self, features: ArrayView2<f64>, labels: ArrayView1<u8>) -> Result<()>;

    /// Predict 0/1 labels, one per feature row.
    fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<u8>>;

    /// Predict the positive-class (churn) probability, one per feature row.
    fn predict_probability(&self, features: ArrayView2<f64>) -> Result<Vec<f64>>;

    /// Identifier reported in the backtest metrics.
    fn name(&self) -> String;
}

/// Assemble the feature matrix and label vector from training rows.
///
/// Callers are responsible for ordering rows (the engine sorts by client id
/// first) so matrix and labels stay aligned and reproducible.
pub fn training_matrix(rows: &[&TrainingRow]) -> Result<(Array2<f64>, Vec<u8>)> {
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.features()).collect();
    let matrix = Array2::from_shape_vec((rows.len(), TrainingRow::FEATURE_COUNT), flat)
        .map_err(|e| PipelineError::Model(e.to_string()))?;
    let labels = rows.iter().map(|r| r.churn).collect();
    Ok((matrix, labels))
}

/// Assemble the feature matrix from test rows.
pub fn test_matrix(rows: &[TestRow]) -> Result<Array2<f64>> {
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.features()).collect();
    Array2::from_shape_vec((rows.len(), TrainingRow::FEATURE_COUNT), flat)
        .map_err(|e| PipelineError::Model(e.to_string()))
}
