//! Per-period top-N client filter.
//!
//! Within each period, clients are ranked by sales descending and only the
//! top N rows are retained. The sort is stable: rows with equal sales keep
//! their prior relative order, and no secondary tie-break key exists.
//! Applied after labeling (labels need full-history continuity) and before
//! the static merge.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::labeling::LabeledPeriodAggregate;

/// Keep the `n` highest-sales rows of each period.
pub fn top_clients_per_period(
    rows: Vec<LabeledPeriodAggregate>,
    n: usize,
) -> Vec<LabeledPeriodAggregate> {
    let mut by_period: BTreeMap<NaiveDate, Vec<LabeledPeriodAggregate>> = BTreeMap::new();
    for row in rows {
        by_period
            .entry(row.rolling.base.period_end)
            .or_default()
            .push(row);
    }

    let mut out = Vec::new();
    for (_, mut period_rows) in by_period {
        period_rows.sort_by(|a, b| {
            b.rolling
                .base
                .sales_net
                .partial_cmp(&a.rolling.base.sales_net)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        period_rows.truncate(n);
        out.extend(period_rows);
    }
    out
}
