//! Period-over-period fractional changes.
//!
//! Each numeric aggregate gets a `(current - previous) / previous` change
//! against the same client's immediately preceding period. The first period
//! of every client has no predecessor and is dropped, which is what removes
//! period-0 noise from the training set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::periods::PeriodAggregate;

/// A period aggregate plus its six fractional-change fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingPeriodAggregate {
    pub base: PeriodAggregate,
    pub sales_change: f64,
    pub order_gap_change: f64,
    pub channel_change: f64,
    pub product_change: f64,
    pub order_count_change: f64,
    pub payment_delay_change: f64,
}

/// Fractional change between consecutive values.
///
/// A zero previous value yields an infinity or NaN per IEEE semantics; such
/// values are retained, not dropped.
fn pct_change(current: f64, previous: f64) -> f64 {
    (current - previous) / previous
}

/// Compute per-client rolling changes, dropping each client's first period.
pub fn compute_changes(rows: Vec<PeriodAggregate>) -> Vec<RollingPeriodAggregate> {
    let mut by_client: BTreeMap<i64, Vec<PeriodAggregate>> = BTreeMap::new();
    for row in rows {
        by_client.entry(row.client_id).or_default().push(row);
    }

    let mut out = Vec::new();
    for (_, mut periods) in by_client {
        periods.sort_by_key(|p| p.period_end);
        for pair in periods.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            out.push(RollingPeriodAggregate {
                sales_change: pct_change(cur.sales_net, prev.sales_net),
                order_gap_change: pct_change(cur.order_gap, prev.order_gap),
                channel_change: pct_change(cur.n_channels as f64, prev.n_channels as f64),
                product_change: pct_change(cur.n_products as f64, prev.n_products as f64),
                order_count_change: pct_change(cur.n_orders as f64, prev.n_orders as f64),
                payment_delay_change: pct_change(cur.payment_delay, prev.payment_delay),
                base: cur.clone(),
            });
        }
    }
    out
}
