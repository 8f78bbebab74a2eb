//! Core data types for the churn pipeline.
//!
//! One `TransactionEvent` per raw sales record; the relationship quality is
//! joined onto every event of a client to form a `JoinedEvent`. Categorical
//! source columns (order channel, relationship quality) are interned into
//! small unsigned codes before any aggregation runs.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// A single raw sales transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub client_id: i64,
    pub date_order: NaiveDate,
    pub date_invoice: NaiveDate,
    /// Interned order-channel code.
    pub order_channel: u8,
    pub branch_id: i64,
    pub product_id: i64,
    pub sales_net: f64,
}

/// One relationship-quality record per client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRelationship {
    pub client_id: i64,
    /// Ordinal relationship-quality code.
    pub quali_relation: u8,
}

/// A transaction event with its client's relationship quality attached.
///
/// Produced by the inner join of transactions and relationships; events for
/// clients absent from the relationship table never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedEvent {
    pub client_id: i64,
    pub date_order: NaiveDate,
    pub date_invoice: NaiveDate,
    pub order_channel: u8,
    pub branch_id: i64,
    pub product_id: i64,
    pub sales_net: f64,
    pub quali_relation: u8,
}

impl JoinedEvent {
    pub fn new(event: TransactionEvent, quali_relation: u8) -> Self {
        Self {
            client_id: event.client_id,
            date_order: event.date_order,
            date_invoice: event.date_invoice,
            order_channel: event.order_channel,
            branch_id: event.branch_id,
            product_id: event.product_id,
            sales_net: event.sales_net,
            quali_relation,
        }
    }

    /// Payment delay in whole days (invoice date minus order date).
    pub fn payment_delay_days(&self) -> i64 {
        (self.date_invoice - self.date_order).num_days()
    }
}

/// Interns string categories into dense `u8` codes, assigned in order of
/// first appearance (the physical representation a categorical cast gives).
#[derive(Debug, Clone, Default)]
pub struct CategoricalEncoder {
    codes: HashMap<String, u8>,
    names: Vec<String>,
}

impl CategoricalEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the code for `value`, assigning the next free code on first
    /// sight. More than 256 distinct values is a schema violation: these
    /// columns are bounded categorical domains.
    pub fn encode(&mut self, value: &str) -> Result<u8> {
        if let Some(&code) = self.codes.get(value) {
            return Ok(code);
        }
        if self.names.len() > u8::MAX as usize {
            return Err(PipelineError::Schema(format!(
                "categorical domain overflow at value '{}'",
                value
            )));
        }
        let code = self.names.len() as u8;
        self.codes.insert(value.to_string(), code);
        self.names.push(value.to_string());
        Ok(code)
    }

    /// Number of distinct categories seen so far.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// The original string for a code, if assigned.
    pub fn name(&self, code: u8) -> Option<&str> {
        self.names.get(code as usize).map(String::as_str)
    }
}
