pub mod backtest;
pub mod config;
pub mod data;
pub mod dataset;
pub mod error;
pub mod features;
pub mod model;

// Re-export commonly used types
pub use backtest::{BacktestEngine, BacktestMetrics, LivePrediction, PredictionRecord, Window};
pub use config::PipelineConfig;
pub use data::{ClientRelationship, DataLoader, JoinedEvent, TransactionEvent};
pub use dataset::{TestRow, TrainingRow};
pub use error::{PipelineError, Result};
pub use features::LabeledPeriodAggregate;
pub use model::{Classifier, LogisticModel};
