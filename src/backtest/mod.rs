//! Walk-forward backtesting.
//!
//! Strictly time-ordered train/evaluate loop over the training periods,
//! followed by a live prediction pass on the current period, and the
//! concatenated classification metrics.

pub mod engine;
pub mod metrics;

pub use engine::{BacktestEngine, LivePrediction, Window};
pub use metrics::{BacktestMetrics, PredictionRecord};
