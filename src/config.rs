//! Pipeline configuration.
//!
//! All knobs of the feature pipeline and the backtest engine live here,
//! loadable from a TOML file. Validation happens once at pipeline entry;
//! a bad threshold, period span, or client cap never reaches a transform.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Configuration for the full churn pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Path to the transaction parquet source.
    pub transactions_path: PathBuf,

    /// Path to the client relationship csv source.
    pub relations_path: PathBuf,

    /// Where live predictions are written.
    pub output_path: PathBuf,

    /// Fractional sales drop in the next period that counts as churn.
    /// Must lie in [-1, 0).
    pub churn_threshold: f64,

    /// Number of top clients (by period sales) retained per period.
    pub n_clients: usize,

    /// Span of a churn period in calendar months.
    pub period_months: u32,

    /// A client whose last order predates a period by this many days or
    /// more is excluded from that period.
    pub recency_days: i64,

    /// Sliding window size in periods for backtest training, or -1 for an
    /// expanding window from the first period.
    pub window: i64,

    /// Cache the processed train/test sets as parquet.
    pub cache: bool,

    /// Directory holding the cached parquet files.
    pub cache_dir: PathBuf,

    /// Append backtest results to the result log.
    pub log_results: bool,

    /// Path of the result log csv.
    pub log_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            transactions_path: PathBuf::from("data/transaction_data.parquet"),
            relations_path: PathBuf::from("data/sales_client_relationship_dataset.csv"),
            output_path: PathBuf::from("data/churn_predictions.csv"),
            churn_threshold: -0.5,
            n_clients: 10_000,
            period_months: 3,
            recency_days: 90,
            window: -1,
            cache: true,
            cache_dir: PathBuf::from("cache"),
            log_results: true,
            log_path: PathBuf::from("log.csv"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::DataAccess(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&raw)
            .map_err(|e| PipelineError::Configuration(format!("{}: {}", path.display(), e)))
    }

    /// Validate the configuration before any data is touched.
    pub fn validate(&self) -> Result<()> {
        if self.period_months == 0 {
            return Err(PipelineError::Configuration(
                "period span must be at least one month".to_string(),
            ));
        }
        if !(-1.0..0.0).contains(&self.churn_threshold) {
            return Err(PipelineError::Configuration(format!(
                "churn threshold must lie in [-1, 0), got {}",
                self.churn_threshold
            )));
        }
        if self.n_clients == 0 {
            return Err(PipelineError::Configuration(
                "top-client count must be positive".to_string(),
            ));
        }
        if self.window != -1 && self.window < 1 {
            return Err(PipelineError::Configuration(format!(
                "window must be -1 (expanding) or a positive period count, got {}",
                self.window
            )));
        }
        Ok(())
    }
}
