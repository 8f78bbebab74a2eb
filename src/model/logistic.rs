//! Default classifier: logistic regression via linfa.

use linfa::prelude::*;
use linfa::DatasetBase;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::{PipelineError, Result};

use super::classifier::Classifier;

/// Logistic-regression churn classifier.
///
/// Probabilities from [`Classifier::predict_probability`] are for the
/// positive (churn = 1) class.
pub struct LogisticModel {
    max_iterations: u64,
    fitted: Option<FittedLogisticRegression<f64, usize>>,
}

impl LogisticModel {
    pub fn new(max_iterations: u64) -> Self {
        Self {
            max_iterations,
            fitted: None,
        }
    }

    fn fitted(&self) -> Result<&FittedLogisticRegression<f64, usize>> {
        self.fitted
            .as_ref()
            .ok_or_else(|| PipelineError::Model("classifier has not been fitted".to_string()))
    }
}

impl Default for LogisticModel {
    fn default() -> Self {
        Self::new(200)
    }
}

impl Classifier for LogisticModel {
    fn fit(&mut self, features: ArrayView2<f64>, labels: ArrayView1<u8>) -> Result<()> {
        let targets: Array1<usize> = labels.iter().map(|&l| l as usize).collect();
        let dataset = DatasetBase::new(features, targets);
        let fitted = LogisticRegression::default()
            .max_iterations(self.max_iterations)
            .fit(&dataset)
            .map_err(|e| PipelineError::Model(e.to_string()))?;
        self.fitted = Some(fitted);
        Ok(())
    }

    fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<u8>> {
        let predictions = self.fitted()?.predict(&features);
        Ok(predictions.iter().map(|&c| c as u8).collect())
    }

    fn predict_probability(&self, features: ArrayView2<f64>) -> Result<Vec<f64>> {
        let probabilities = self.fitted()?.predict_probabilities(&features);
        Ok(probabilities.to_vec())
    }

    fn name(&self) -> String {
        format!("LogisticRegression(max_iterations={})", self.max_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, aview1, Array2};

    // linearly separable toy data on the first feature
    fn toy() -> (Array2<f64>, Vec<u8>) {
        let features = array![
            [0.0, 1.0],
            [0.5, 1.0],
            [1.0, 1.0],
            [9.0, 1.0],
            [9.5, 1.0],
            [10.0, 1.0],
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (features, labels)
    }

    #[test]
    fn fits_and_separates_toy_data() {
        let (features, labels) = toy();
        let mut model = LogisticModel::default();
        model.fit(features.view(), aview1(&labels)).unwrap();

        let predictions = model.predict(features.view()).unwrap();
        assert_eq!(predictions, labels);

        let probabilities = model.predict_probability(features.view()).unwrap();
        assert_eq!(probabilities.len(), 6);
        assert!(probabilities[0] < 0.5);
        assert!(probabilities[5] > 0.5);
        assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn predict_before_fit_is_a_model_error() {
        let model = LogisticModel::default();
        let (features, _) = toy();
        assert!(matches!(
            model.predict(features.view()),
            Err(PipelineError::Model(_))
        ));
    }

    #[test]
    fn single_class_training_is_a_model_error() {
        let features = array![[0.0, 1.0], [1.0, 1.0]];
        let mut model = LogisticModel::default();
        assert!(matches!(
            model.fit(features.view(), aview1(&[0, 0])),
            Err(PipelineError::Model(_))
        ));
    }
}
