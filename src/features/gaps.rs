//! Inter-order gap derivation.
//!
//! For each client, distinct order dates are sorted ascending and the gap to
//! the previous distinct date is attached to every event sharing that
//! (client, date). Events on a client's first order date have no gap and are
//! dropped here.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::NaiveDate;

use crate::data::JoinedEvent;

/// A joined event carrying its client's inter-order gap for the event date.
#[derive(Debug, Clone, PartialEq)]
pub struct GappedEvent {
    pub event: JoinedEvent,
    /// Days since the client's previous distinct order date.
    pub order_gap: i64,
}

/// Attach inter-order gaps to events, dropping first-order-date events.
pub fn attach_order_gaps(events: Vec<JoinedEvent>) -> Vec<GappedEvent> {
    // Distinct order dates per client, sorted by the BTreeSet.
    let mut dates_by_client: BTreeMap<i64, BTreeSet<NaiveDate>> = BTreeMap::new();
    for event in &events {
        dates_by_client
            .entry(event.client_id)
            .or_default()
            .insert(event.date_order);
    }

    let mut gaps: HashMap<(i64, NaiveDate), i64> = HashMap::new();
    for (&client_id, dates) in &dates_by_client {
        let mut previous: Option<NaiveDate> = None;
        for &date in dates {
            if let Some(prev) = previous {
                gaps.insert((client_id, date), (date - prev).num_days());
            }
            previous = Some(date);
        }
    }

    events
        .into_iter()
        .filter_map(|event| {
            gaps.get(&(event.client_id, event.date_order))
                .map(|&order_gap| GappedEvent { event, order_gap })
        })
        .collect()
}
