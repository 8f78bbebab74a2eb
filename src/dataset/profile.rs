//! Static per-client profiles.
//!
//! Full-history boundaries and relationship quality per client, computed
//! from the complete joined event set before any gap filtering, so first
//! and last order dates reflect every transaction.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::JoinedEvent;

/// Lifetime attributes of a client, independent of any period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticClientProfile {
    pub client_id: i64,
    pub quali_relation: u8,
    pub first_order: NaiveDate,
    pub last_order: NaiveDate,
}

/// Extract one profile per client from the joined event stream.
pub fn static_profiles(events: &[JoinedEvent]) -> BTreeMap<i64, StaticClientProfile> {
    let mut profiles: BTreeMap<i64, StaticClientProfile> = BTreeMap::new();
    for event in events {
        profiles
            .entry(event.client_id)
            .and_modify(|p| {
                p.first_order = p.first_order.min(event.date_order);
                p.last_order = p.last_order.max(event.date_order);
            })
            .or_insert(StaticClientProfile {
                client_id: event.client_id,
                quali_relation: event.quali_relation,
                first_order: event.date_order,
                last_order: event.date_order,
            });
    }
    profiles
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn event(client_id: i64, order: NaiveDate, quality: u8) -> JoinedEvent {
        JoinedEvent {
            client_id,
            date_order: order,
            date_invoice: order,
            order_channel: 0,
            branch_id: 1,
            product_id: 1,
            sales_net: 10.0,
            quali_relation: quality,
        }
    }

    #[test]
    fn profile_spans_full_history() {
        let events = vec![
            event(1, date(2020, 6, 1), 2),
            event(1, date(2020, 1, 1), 2),
            event(1, date(2020, 3, 1), 2),
            event(2, date(2020, 2, 1), 1),
        ];
        let profiles = static_profiles(&events);
        assert_eq!(profiles.len(), 2);

        let p1 = &profiles[&1];
        assert_eq!(p1.first_order, date(2020, 1, 1));
        assert_eq!(p1.last_order, date(2020, 6, 1));
        assert_eq!(p1.quali_relation, 2);

        let p2 = &profiles[&2];
        assert_eq!(p2.first_order, p2.last_order);
    }
}
