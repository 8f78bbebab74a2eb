//! Periodization of events into fixed-width calendar buckets.
//!
//! Events are grouped per client into buckets of `span_months` calendar
//! months on a shared grid: bucket starts are whole months truncated to a
//! multiple of the span (Jan/Apr/Jul/Oct for a 3-month span), so every
//! client sees the same period boundaries. A bucket covers
//! `[start, start + span)` and is identified by its upper edge, so a
//! period's date value is the end boundary of its window.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::gaps::GappedEvent;

/// Per-(client, period) aggregate statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodAggregate {
    pub client_id: i64,
    /// Upper edge of the period's bucket.
    pub period_end: NaiveDate,
    /// Sum of net sales within the period.
    pub sales_net: f64,
    /// Mean inter-order gap over events, in whole days.
    pub order_gap: f64,
    /// Distinct order channels used.
    pub n_channels: u32,
    /// Distinct branches ordered from.
    pub n_branches: u32,
    /// Distinct products ordered.
    pub n_products: u32,
    /// Distinct invoice dates (order count).
    pub n_orders: u32,
    /// Mean payment delay over events, in whole days.
    pub payment_delay: f64,
}

/// Bucket events into per-client periods and aggregate each bucket.
///
/// Per-client work is a pure map over the partition key and runs in
/// parallel; the ordered collect keeps the output deterministic (clients
/// ascending, periods ascending within a client).
pub fn aggregate_periods(events: Vec<GappedEvent>, span_months: u32) -> Vec<PeriodAggregate> {
    let mut by_client: BTreeMap<i64, Vec<GappedEvent>> = BTreeMap::new();
    for event in events {
        by_client.entry(event.event.client_id).or_default().push(event);
    }

    let partitions: Vec<(i64, Vec<GappedEvent>)> = by_client.into_iter().collect();
    partitions
        .into_par_iter()
        .map(|(client_id, mut events)| {
            events.sort_by_key(|e| e.event.date_order);
            aggregate_client(client_id, &events, span_months)
        })
        .collect::<Vec<Vec<PeriodAggregate>>>()
        .into_iter()
        .flatten()
        .collect()
}

/// Aggregate one client's chronologically sorted events into grid periods.
fn aggregate_client(
    client_id: i64,
    events: &[GappedEvent],
    span_months: u32,
) -> Vec<PeriodAggregate> {
    let mut buckets: BTreeMap<NaiveDate, Vec<&GappedEvent>> = BTreeMap::new();
    for event in events {
        buckets
            .entry(period_upper_edge(event.event.date_order, span_months))
            .or_default()
            .push(event);
    }

    buckets
        .into_iter()
        .map(|(upper, bucket)| aggregate_bucket(client_id, upper, &bucket))
        .collect()
}

/// Upper edge of the grid bucket containing `date`.
///
/// The bucket's lower edge is the first day of the month obtained by
/// truncating the date's month index to a multiple of the span, so the grid
/// is global rather than relative to any client's history. An event on an
/// edge belongs to the bucket starting there.
fn period_upper_edge(date: NaiveDate, span_months: u32) -> NaiveDate {
    let span = span_months as i32;
    let month_index = date.year() * 12 + date.month() as i32 - 1;
    let floored = month_index.div_euclid(span) * span;
    let lower = NaiveDate::from_ymd_opt(floored.div_euclid(12), floored.rem_euclid(12) as u32 + 1, 1)
        .unwrap_or(date);
    add_months(lower, span)
}

fn aggregate_bucket(
    client_id: i64,
    period_end: NaiveDate,
    events: &[&GappedEvent],
) -> PeriodAggregate {
    let count = events.len() as f64;
    let sales_net = events.iter().map(|e| e.event.sales_net).sum();

    let gap_total: i64 = events.iter().map(|e| e.order_gap).sum();
    let delay_total: i64 = events.iter().map(|e| e.event.payment_delay_days()).sum();

    let mut channels = BTreeSet::new();
    let mut branches = BTreeSet::new();
    let mut products = BTreeSet::new();
    let mut invoice_dates = BTreeSet::new();
    for e in events {
        channels.insert(e.event.order_channel);
        branches.insert(e.event.branch_id);
        products.insert(e.event.product_id);
        invoice_dates.insert(e.event.date_invoice);
    }

    PeriodAggregate {
        client_id,
        period_end,
        sales_net,
        // means truncated to whole days, matching duration-to-days casts
        order_gap: (gap_total as f64 / count).trunc(),
        n_channels: channels.len() as u32,
        n_branches: branches.len() as u32,
        n_products: products.len() as u32,
        n_orders: invoice_dates.len() as u32,
        payment_delay: (delay_total as f64 / count).trunc(),
    }
}

/// Add calendar months to a date, clamping the day on overflow
/// (e.g. Jan 31 + 1 month = Feb 28/29).
pub fn add_months(date: NaiveDate, months: i32) -> NaiveDate {
    let mut year = date.year();
    let mut month = date.month() as i32 + months;

    while month > 12 {
        year += 1;
        month -= 12;
    }
    while month < 1 {
        year -= 1;
        month += 12;
    }

    let day = date.day().min(days_in_month(year, month as u32));
    NaiveDate::from_ymd_opt(year, month as u32, day).unwrap_or(date)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}
