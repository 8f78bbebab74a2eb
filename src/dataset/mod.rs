//! Dataset assembly: static profiles, merge/split, and the parquet cache.

pub mod cache;
pub mod profile;
pub mod split;

pub use cache::{append_result_log, read_cache, write_cache, write_predictions};
pub use profile::{static_profiles, StaticClientProfile};
pub use split::{merge_and_split, TestRow, TrainingRow};

use tracing::info;

use crate::config::PipelineConfig;
use crate::data::DataLoader;
use crate::error::Result;
use crate::features;

/// Build the full train/test dataset from the raw sources.
pub fn build(config: &PipelineConfig) -> Result<(Vec<TrainingRow>, Vec<TestRow>)> {
    config.validate()?;

    let loader = DataLoader::new(&config.transactions_path, &config.relations_path);
    let joined = loader.load_joined()?;
    info!(events = joined.len(), "joined transaction and relationship sources");

    // static profiles come from the full history, before gap filtering
    let profiles = static_profiles(&joined);
    let labeled = features::build(joined, config)?;
    merge_and_split(labeled, &profiles, config.recency_days)
}
