//! Walk-forward backtest engine.
//!
//! Iterates the ordered sequence of training periods, refitting the
//! classifier from scratch for each fold: train on the window of elapsed
//! periods, predict the next one. After all folds, the classifier is refit
//! on the final eligible window and applied to the live test set.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use indicatif::{ProgressBar, ProgressStyle};
use ndarray::aview1;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::{TestRow, TrainingRow};
use crate::error::{PipelineError, Result};
use crate::model::{test_matrix, training_matrix, Classifier};

use super::metrics::{BacktestMetrics, PredictionRecord};

/// Training window policy for each fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    /// Train on every period since the first.
    Expanding,
    /// Train on the given number of trailing periods.
    Sliding(usize),
}

impl Window {
    /// Interpret the configured window integer: -1 is expanding, a positive
    /// value is a sliding period count.
    pub fn from_config(raw: i64) -> Result<Self> {
        match raw {
            -1 => Ok(Self::Expanding),
            w if w >= 1 => Ok(Self::Sliding(w as usize)),
            w => Err(PipelineError::Configuration(format!(
                "window must be -1 (expanding) or a positive period count, got {}",
                w
            ))),
        }
    }
}

/// A live prediction for one current-period client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LivePrediction {
    pub client_id: i64,
    pub predicted_churn: u8,
    /// Positive-class probability in [0, 1].
    pub probability: f64,
}

/// Walk-forward backtest driver.
pub struct BacktestEngine {
    window: Window,
}

impl BacktestEngine {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    /// Run the backtest and the final live prediction pass.
    ///
    /// The classifier is an exclusive resource: it is refit from scratch for
    /// every fold, so no model state leaks between iterations.
    pub fn run(
        &self,
        model: &mut dyn Classifier,
        train: &[TrainingRow],
        test: &[TestRow],
    ) -> Result<(BacktestMetrics, Vec<LivePrediction>)> {
        let time_points = self.time_points(train)?;
        let start_index = match self.window {
            Window::Expanding => 1,
            Window::Sliding(w) => w,
        };

        let bar = ProgressBar::new((time_points.len() - start_index) as u64);
        bar.set_style(
            ProgressStyle::with_template("backtest {bar:30} {pos}/{len} periods")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut records = Vec::new();
        for t in start_index..time_points.len() {
            let predict_date = time_points[t];
            let start_date = match self.window {
                Window::Expanding => time_points[0],
                Window::Sliding(w) => time_points[t - w],
            };
            debug!(fold = t, %start_date, %predict_date, "backtesting fold");

            let mut train_slice: Vec<&TrainingRow> = train
                .iter()
                .filter(|r| r.period >= start_date && r.period < predict_date)
                .collect();
            train_slice.sort_by_key(|r| r.client_id);

            let mut held_out: Vec<&TrainingRow> = train
                .iter()
                .filter(|r| r.period == predict_date)
                .collect();
            held_out.sort_by_key(|r| r.client_id);

            let (x_train, y_train) = training_matrix(&train_slice)?;
            model.fit(x_train.view(), aview1(&y_train))?;

            let (x_predict, y_actual) = training_matrix(&held_out)?;
            let predictions = model.predict(x_predict.view())?;

            for ((row, actual), predicted) in held_out.iter().zip(y_actual).zip(predictions) {
                records.push(PredictionRecord {
                    client_id: row.client_id,
                    period: row.period,
                    actual,
                    predicted,
                });
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        let metrics = BacktestMetrics::from_records(model.name(), &records);
        info!(records = records.len(), "backtest complete: {}", metrics.summary());

        let live = self.predict_live(model, train, test, &time_points)?;
        Ok((metrics, live))
    }

    /// Refit on the final eligible window and predict the live test set.
    fn predict_live(
        &self,
        model: &mut dyn Classifier,
        train: &[TrainingRow],
        test: &[TestRow],
        time_points: &[NaiveDate],
    ) -> Result<Vec<LivePrediction>> {
        let start_date = match self.window {
            Window::Expanding => time_points[0],
            Window::Sliding(w) => time_points[time_points.len() - w],
        };

        let mut train_slice: Vec<&TrainingRow> =
            train.iter().filter(|r| r.period >= start_date).collect();
        train_slice.sort_by_key(|r| r.client_id);

        let (x_train, y_train) = training_matrix(&train_slice)?;
        model.fit(x_train.view(), aview1(&y_train))?;

        let x_live = test_matrix(test)?;
        let predictions = model.predict(x_live.view())?;
        let probabilities = model.predict_probability(x_live.view())?;

        info!(clients = test.len(), "made live predictions");
        Ok(test
            .iter()
            .zip(predictions)
            .zip(probabilities)
            .map(|((row, predicted_churn), probability)| LivePrediction {
                client_id: row.client_id,
                predicted_churn,
                probability,
            })
            .collect())
    }

    /// Ordered, deduplicated period dates of the training set, with the
    /// window validated against their count.
    fn time_points(&self, train: &[TrainingRow]) -> Result<Vec<NaiveDate>> {
        let time_points: Vec<NaiveDate> = train
            .iter()
            .map(|r| r.period)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if time_points.len() < 2 {
            return Err(PipelineError::Configuration(format!(
                "backtest needs at least 2 training periods, got {}",
                time_points.len()
            )));
        }
        if let Window::Sliding(w) = self.window {
            if w >= time_points.len() - 1 {
                return Err(PipelineError::Configuration(format!(
                    "window too large, must be < {}",
                    time_points.len() - 1
                )));
            }
        }
        Ok(time_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{ArrayView1, ArrayView2};

    /// Predicts a constant label; records how it was fitted.
    struct ConstantClassifier {
        label: u8,
        fit_sizes: Vec<usize>,
        fit_client_ids: Vec<Vec<f64>>,
    }

    impl ConstantClassifier {
        fn new(label: u8) -> Self {
            Self {
                label,
                fit_sizes: Vec::new(),
                fit_client_ids: Vec::new(),
            }
        }
    }

    impl Classifier for ConstantClassifier {
        fn fit(&mut self, features: ArrayView2<f64>, _labels: ArrayView1<u8>) -> Result<()> {
            self.fit_sizes.push(features.nrows());
            // column 0 is sales_net, unique per client in these tests
            self.fit_client_ids
                .push(features.column(0).iter().copied().collect());
            Ok(())
        }

        fn predict(&self, features: ArrayView2<f64>) -> Result<Vec<u8>> {
            Ok(vec![self.label; features.nrows()])
        }

        fn predict_probability(&self, features: ArrayView2<f64>) -> Result<Vec<f64>> {
            Ok(vec![self.label as f64; features.nrows()])
        }

        fn name(&self) -> String {
            "constant".to_string()
        }
    }

    fn date(month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, month, 1).unwrap()
    }

    fn train_row(client_id: i64, month: u32, churn: u8) -> TrainingRow {
        TrainingRow {
            client_id,
            period: date(month),
            // sales doubles as a row marker in the stub classifier
            sales_net: client_id as f64,
            order_gap: 1.0,
            n_channels: 1,
            n_branches: 1,
            n_products: 1,
            n_orders: 1,
            payment_delay: 1.0,
            sales_change: 0.0,
            order_gap_change: 0.0,
            channel_change: 0.0,
            product_change: 0.0,
            order_count_change: 0.0,
            payment_delay_change: 0.0,
            quali_relation: 0,
            client_age: 100,
            churn,
        }
    }

    fn test_row(client_id: i64) -> TestRow {
        TestRow {
            client_id,
            period: date(10),
            sales_net: client_id as f64,
            order_gap: 1.0,
            n_channels: 1,
            n_branches: 1,
            n_products: 1,
            n_orders: 1,
            payment_delay: 1.0,
            sales_change: 0.0,
            order_gap_change: 0.0,
            channel_change: 0.0,
            product_change: 0.0,
            order_count_change: 0.0,
            payment_delay_change: 0.0,
            quali_relation: 0,
            client_age: 100,
        }
    }

    /// 3 periods, 2 clients each: client 1 churns in periods 4 and 7.
    fn fixture() -> (Vec<TrainingRow>, Vec<TestRow>) {
        let train = vec![
            train_row(1, 1, 0),
            train_row(2, 1, 0),
            train_row(1, 4, 1),
            train_row(2, 4, 0),
            train_row(1, 7, 1),
            train_row(2, 7, 0),
        ];
        let test = vec![test_row(1), test_row(2)];
        (train, test)
    }

    #[test]
    fn sliding_window_too_large_is_rejected() {
        let (train, test) = fixture();
        // 3 distinct periods: any window >= 2 must fail
        for w in [2usize, 3, 5] {
            let engine = BacktestEngine::new(Window::Sliding(w));
            let mut model = ConstantClassifier::new(0);
            assert!(matches!(
                engine.run(&mut model, &train, &test),
                Err(PipelineError::Configuration(_))
            ));
        }
    }

    #[test]
    fn window_from_config_parses_sentinel() {
        assert_eq!(Window::from_config(-1).unwrap(), Window::Expanding);
        assert_eq!(Window::from_config(3).unwrap(), Window::Sliding(3));
        assert!(Window::from_config(0).is_err());
        assert!(Window::from_config(-2).is_err());
    }

    #[test]
    fn expanding_window_visits_every_later_period() {
        let (train, test) = fixture();
        let engine = BacktestEngine::new(Window::Expanding);
        let mut model = ConstantClassifier::new(0);
        let (metrics, live) = engine.run(&mut model, &train, &test).unwrap();

        // folds predict periods 4 and 7 (2 clients each), then the live fit
        assert_eq!(model.fit_sizes, vec![2, 4, 6]);
        // always-0 predictions: 4 records, 2 correct
        assert_relative_eq!(metrics.accuracy, 0.5);
        assert!(metrics.precision.is_nan());
        assert_relative_eq!(metrics.recall, 0.0);
        assert_eq!(live.len(), 2);
        assert!(live.iter().all(|p| p.predicted_churn == 0));
    }

    #[test]
    fn sliding_window_trains_on_trailing_periods_only() {
        let (train, test) = fixture();
        let engine = BacktestEngine::new(Window::Sliding(1));
        let mut model = ConstantClassifier::new(1);
        let (metrics, _) = engine.run(&mut model, &train, &test).unwrap();

        // fold 1: train on period 1 only; fold 2: train on period 4 only;
        // live: train on periods >= 7
        assert_eq!(model.fit_sizes, vec![2, 2, 2]);
        // always-1 predictions over actuals [1,0,1,0]
        assert_relative_eq!(metrics.accuracy, 0.5);
        assert_relative_eq!(metrics.precision, 0.5);
        assert_relative_eq!(metrics.recall, 1.0);
    }

    #[test]
    fn slices_are_sorted_by_client_id() {
        // rows deliberately out of client order
        let train = vec![
            train_row(9, 1, 0),
            train_row(3, 1, 0),
            train_row(5, 1, 1),
            train_row(9, 4, 1),
            train_row(3, 4, 0),
        ];
        let test = vec![test_row(1)];
        let engine = BacktestEngine::new(Window::Expanding);
        let mut model = ConstantClassifier::new(0);
        engine.run(&mut model, &train, &test).unwrap();

        for ids in &model.fit_client_ids {
            let mut sorted = ids.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            assert_eq!(*ids, sorted);
        }
    }

    #[test]
    fn single_period_training_set_is_rejected() {
        let train = vec![train_row(1, 1, 0), train_row(2, 1, 1)];
        let engine = BacktestEngine::new(Window::Expanding);
        let mut model = ConstantClassifier::new(0);
        assert!(matches!(
            engine.run(&mut model, &train, &[]),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn live_probabilities_come_from_the_classifier() {
        let (train, test) = fixture();
        let engine = BacktestEngine::new(Window::Expanding);
        let mut model = ConstantClassifier::new(1);
        let (_, live) = engine.run(&mut model, &train, &test).unwrap();
        assert_eq!(live.len(), 2);
        for prediction in &live {
            assert_eq!(prediction.predicted_churn, 1);
            assert_relative_eq!(prediction.probability, 1.0);
        }
    }
}
