//! Temporal feature pipeline.
//!
//! Transforms joined events into labeled per-period aggregates:
//! order-gap derivation, periodization, rolling fractional changes,
//! forward-shifted churn labels, and the per-period top-N client filter.

pub mod gaps;
pub mod labeling;
pub mod periods;
pub mod rolling;
pub mod topn;

pub use gaps::{attach_order_gaps, GappedEvent};
pub use labeling::{label_churn, LabeledPeriodAggregate};
pub use periods::{aggregate_periods, PeriodAggregate};
pub use rolling::{compute_changes, RollingPeriodAggregate};
pub use topn::top_clients_per_period;

use tracing::debug;

use crate::config::PipelineConfig;
use crate::data::JoinedEvent;
use crate::error::Result;

/// Run the full temporal pipeline over joined events.
///
/// Validates the configuration before any transform runs; stage boundaries
/// are materialized so each step sees an owned, immutable input.
pub fn build(events: Vec<JoinedEvent>, config: &PipelineConfig) -> Result<Vec<LabeledPeriodAggregate>> {
    config.validate()?;

    let gapped = attach_order_gaps(events);
    debug!(events = gapped.len(), "attached inter-order gaps");

    let aggregates = aggregate_periods(gapped, config.period_months);
    debug!(periods = aggregates.len(), "aggregated periods");

    let rolling = compute_changes(aggregates);
    let labeled = label_churn(rolling, config.churn_threshold);
    let filtered = top_clients_per_period(labeled, config.n_clients);
    debug!(rows = filtered.len(), "labeled and filtered period rows");

    Ok(filtered)
}
