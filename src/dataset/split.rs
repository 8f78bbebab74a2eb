//! Static feature merge, recency filter, and train/test split.
//!
//! Labeled period rows are joined with the static client profiles, the
//! recency filter keeps only rows whose period boundary lies within the
//! recency horizon of the client's last order, and the result is
//! partitioned by period date: everything
//! strictly before the maximum period (with a concrete label) becomes the
//! training set; the maximum period itself, label stripped, becomes the
//! live test set.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::features::LabeledPeriodAggregate;

use super::profile::StaticClientProfile;

/// A fully merged, labeled row of the training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRow {
    pub client_id: i64,
    pub period: NaiveDate,
    pub sales_net: f64,
    pub order_gap: f64,
    pub n_channels: u32,
    pub n_branches: u32,
    pub n_products: u32,
    pub n_orders: u32,
    pub payment_delay: f64,
    pub sales_change: f64,
    pub order_gap_change: f64,
    pub channel_change: f64,
    pub product_change: f64,
    pub order_count_change: f64,
    pub payment_delay_change: f64,
    pub quali_relation: u8,
    /// Days since the client's first order, as of the period.
    pub client_age: i64,
    pub churn: u8,
}

/// A current-period row whose label is unknown and to be predicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRow {
    pub client_id: i64,
    pub period: NaiveDate,
    pub sales_net: f64,
    pub order_gap: f64,
    pub n_channels: u32,
    pub n_branches: u32,
    pub n_products: u32,
    pub n_orders: u32,
    pub payment_delay: f64,
    pub sales_change: f64,
    pub order_gap_change: f64,
    pub channel_change: f64,
    pub product_change: f64,
    pub order_count_change: f64,
    pub payment_delay_change: f64,
    pub quali_relation: u8,
    pub client_age: i64,
}

impl TrainingRow {
    /// Number of model features per row.
    pub const FEATURE_COUNT: usize = 15;

    /// Feature vector in the fixed column order shared with [`TestRow`].
    pub fn features(&self) -> [f64; Self::FEATURE_COUNT] {
        [
            self.sales_net,
            self.order_gap,
            self.n_channels as f64,
            self.n_branches as f64,
            self.n_products as f64,
            self.n_orders as f64,
            self.payment_delay,
            self.sales_change,
            self.order_gap_change,
            self.channel_change,
            self.product_change,
            self.order_count_change,
            self.payment_delay_change,
            self.quali_relation as f64,
            self.client_age as f64,
        ]
    }
}

impl TestRow {
    /// Feature vector in the fixed column order shared with [`TrainingRow`].
    pub fn features(&self) -> [f64; TrainingRow::FEATURE_COUNT] {
        [
            self.sales_net,
            self.order_gap,
            self.n_channels as f64,
            self.n_branches as f64,
            self.n_products as f64,
            self.n_orders as f64,
            self.payment_delay,
            self.sales_change,
            self.order_gap_change,
            self.channel_change,
            self.product_change,
            self.order_count_change,
            self.payment_delay_change,
            self.quali_relation as f64,
            self.client_age as f64,
        ]
    }
}

/// Join period rows with static profiles and split into train/test sets.
pub fn merge_and_split(
    labeled: Vec<LabeledPeriodAggregate>,
    profiles: &BTreeMap<i64, StaticClientProfile>,
    recency_days: i64,
) -> Result<(Vec<TrainingRow>, Vec<TestRow>)> {
    // inner join + recency filter
    let merged: Vec<(LabeledPeriodAggregate, StaticClientProfile)> = labeled
        .into_iter()
        .filter_map(|row| {
            profiles
                .get(&row.rolling.base.client_id)
                .map(|&profile| (row, profile))
        })
        .filter(|(row, profile)| {
            (profile.last_order - row.rolling.base.period_end).num_days() < recency_days
        })
        .collect();

    let max_period = merged
        .iter()
        .map(|(row, _)| row.rolling.base.period_end)
        .max()
        .ok_or_else(|| {
            PipelineError::Configuration("no periods left in dataset after filtering".to_string())
        })?;

    let mut train = Vec::new();
    let mut test = Vec::new();
    for (row, profile) in merged {
        let base = &row.rolling.base;
        let client_age = (base.period_end - profile.first_order).num_days();

        if base.period_end == max_period {
            test.push(TestRow {
                client_id: base.client_id,
                period: base.period_end,
                sales_net: base.sales_net,
                order_gap: base.order_gap,
                n_channels: base.n_channels,
                n_branches: base.n_branches,
                n_products: base.n_products,
                n_orders: base.n_orders,
                payment_delay: base.payment_delay,
                sales_change: row.rolling.sales_change,
                order_gap_change: row.rolling.order_gap_change,
                channel_change: row.rolling.channel_change,
                product_change: row.rolling.product_change,
                order_count_change: row.rolling.order_count_change,
                payment_delay_change: row.rolling.payment_delay_change,
                quali_relation: profile.quali_relation,
                client_age,
            });
        } else if let Some(churn) = row.churn {
            // rows before the maximum period need a concrete label; an
            // unlabeled earlier row only arises at pipeline boundaries and
            // is dropped here as the final leakage guard
            train.push(TrainingRow {
                client_id: base.client_id,
                period: base.period_end,
                sales_net: base.sales_net,
                order_gap: base.order_gap,
                n_channels: base.n_channels,
                n_branches: base.n_branches,
                n_products: base.n_products,
                n_orders: base.n_orders,
                payment_delay: base.payment_delay,
                sales_change: row.rolling.sales_change,
                order_gap_change: row.rolling.order_gap_change,
                channel_change: row.rolling.channel_change,
                product_change: row.rolling.product_change,
                order_count_change: row.rolling.order_count_change,
                payment_delay_change: row.rolling.payment_delay_change,
                quali_relation: profile.quali_relation,
                client_age,
                churn,
            });
        }
    }

    debug!(
        train = train.len(),
        test = test.len(),
        max_period = %max_period,
        "split dataset"
    );
    Ok((train, test))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::periods::PeriodAggregate;
    use crate::features::rolling::RollingPeriodAggregate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn labeled(client_id: i64, period: NaiveDate, churn: Option<u8>) -> LabeledPeriodAggregate {
        LabeledPeriodAggregate {
            rolling: RollingPeriodAggregate {
                base: PeriodAggregate {
                    client_id,
                    period_end: period,
                    sales_net: 100.0,
                    order_gap: 5.0,
                    n_channels: 1,
                    n_branches: 1,
                    n_products: 2,
                    n_orders: 3,
                    payment_delay: 2.0,
                },
                sales_change: 0.1,
                order_gap_change: 0.0,
                channel_change: 0.0,
                product_change: 0.0,
                order_count_change: 0.0,
                payment_delay_change: 0.0,
            },
            churn,
        }
    }

    fn profile(client_id: i64, first: NaiveDate, last: NaiveDate) -> StaticClientProfile {
        StaticClientProfile {
            client_id,
            quali_relation: 1,
            first_order: first,
            last_order: last,
        }
    }

    fn profiles_for(
        entries: &[(i64, NaiveDate, NaiveDate)],
    ) -> BTreeMap<i64, StaticClientProfile> {
        entries
            .iter()
            .map(|&(id, first, last)| (id, profile(id, first, last)))
            .collect()
    }

    #[test]
    fn partitions_by_maximum_period() {
        let rows = vec![
            labeled(1, date(2020, 4, 1), Some(0)),
            labeled(1, date(2020, 7, 1), None),
            labeled(2, date(2020, 4, 1), Some(1)),
        ];
        let profiles = profiles_for(&[
            (1, date(2019, 1, 1), date(2020, 6, 20)),
            (2, date(2019, 1, 1), date(2020, 3, 20)),
        ]);

        let (train, test) = merge_and_split(rows, &profiles, 90).unwrap();

        assert_eq!(train.len(), 2);
        assert_eq!(test.len(), 1);
        assert!(train.iter().all(|r| r.period < date(2020, 7, 1)));
        assert!(test.iter().all(|r| r.period == date(2020, 7, 1)));
        // every training row carries a concrete binary label
        assert!(train.iter().all(|r| r.churn <= 1));
    }

    #[test]
    fn client_age_is_days_since_first_order() {
        let rows = vec![
            labeled(1, date(2020, 4, 1), Some(0)),
            labeled(1, date(2020, 7, 1), None),
        ];
        let profiles = profiles_for(&[(1, date(2020, 1, 1), date(2020, 6, 20))]);
        let (train, _) = merge_and_split(rows, &profiles, 90).unwrap();
        assert_eq!(train[0].client_age, 91);
    }

    #[test]
    fn recency_filter_drops_rows_far_from_last_order() {
        // client 2's last order is 105 days past the period boundary, at or
        // beyond the 90-day horizon, so its 2020-04-01 row is dropped
        let rows = vec![
            labeled(1, date(2020, 4, 1), Some(0)),
            labeled(2, date(2020, 4, 1), Some(0)),
            labeled(1, date(2020, 7, 1), None),
        ];
        let profiles = profiles_for(&[
            (1, date(2019, 1, 1), date(2020, 6, 1)),
            (2, date(2019, 1, 1), date(2020, 7, 15)),
        ]);
        let (train, _) = merge_and_split(rows, &profiles, 90).unwrap();
        assert_eq!(train.len(), 1);
        assert_eq!(train[0].client_id, 1);
    }

    #[test]
    fn unlabeled_rows_before_max_period_are_dropped() {
        let rows = vec![
            labeled(1, date(2020, 4, 1), None),
            labeled(1, date(2020, 7, 1), None),
        ];
        let profiles = profiles_for(&[(1, date(2019, 1, 1), date(2020, 6, 20))]);
        let (train, test) = merge_and_split(rows, &profiles, 90).unwrap();
        assert!(train.is_empty());
        assert_eq!(test.len(), 1);
    }

    #[test]
    fn empty_dataset_is_a_configuration_error() {
        let profiles = profiles_for(&[]);
        assert!(matches!(
            merge_and_split(Vec::new(), &profiles, 90),
            Err(PipelineError::Configuration(_))
        ));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let rows = vec![
            labeled(1, date(2020, 4, 1), Some(0)),
            labeled(2, date(2020, 4, 1), Some(1)),
            labeled(1, date(2020, 7, 1), None),
        ];
        let profiles = profiles_for(&[
            (1, date(2019, 1, 1), date(2020, 6, 20)),
            (2, date(2019, 1, 1), date(2020, 3, 20)),
        ]);
        let first = merge_and_split(rows.clone(), &profiles, 90).unwrap();
        let second = merge_and_split(rows, &profiles, 90).unwrap();
        assert_eq!(first, second);
    }
}
