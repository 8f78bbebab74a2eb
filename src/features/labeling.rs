//! Forward-shifted churn labeling.
//!
//! A period is labeled 1 when the *next* period's sales change for the same
//! client falls strictly below the churn threshold. The label intentionally
//! looks one period ahead for the same client only; each client's most
//! recent period has no successor and stays unlabeled.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::rolling::RollingPeriodAggregate;

/// A rolling aggregate with its churn label, when defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledPeriodAggregate {
    pub rolling: RollingPeriodAggregate,
    /// 1 = client churns starting next period; None on the final period.
    pub churn: Option<u8>,
}

/// Assign churn labels by looking one period ahead within each client.
pub fn label_churn(rows: Vec<RollingPeriodAggregate>, threshold: f64) -> Vec<LabeledPeriodAggregate> {
    let mut by_client: BTreeMap<i64, Vec<RollingPeriodAggregate>> = BTreeMap::new();
    for row in rows {
        by_client.entry(row.base.client_id).or_default().push(row);
    }

    let mut out = Vec::new();
    for (_, mut periods) in by_client {
        periods.sort_by_key(|p| p.base.period_end);
        let next_changes: Vec<Option<f64>> = periods
            .iter()
            .skip(1)
            .map(|p| Some(p.sales_change))
            .chain(std::iter::once(None))
            .collect();
        for (rolling, next) in periods.into_iter().zip(next_changes) {
            let churn = next.map(|change| u8::from(change < threshold));
            out.push(LabeledPeriodAggregate { rolling, churn });
        }
    }
    out
}
