//! Error taxonomy for the churn pipeline.
//!
//! Configuration and schema problems are fatal and surface before any
//! transform runs. Degenerate backtest metrics (zero precision/recall
//! denominators) are deliberately *not* errors; they are reported as NaN
//! so the backtest report always completes.

use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// A data source could not be read.
    #[error("data source unreadable: {0}")]
    DataAccess(String),

    /// An expected column is missing or has the wrong type.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid pipeline configuration, rejected at entry.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The classifier collaborator failed to fit or predict.
    #[error("model error: {0}")]
    Model(String),

    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
