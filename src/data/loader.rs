//! Ingestion and join of the raw sources.
//!
//! Loads transaction events from parquet and client relationships from csv,
//! normalizes types (calendar dates, interned categorical codes), and inner
//! joins the two on client id. Clients with transactions but no relationship
//! record are dropped at the join.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};

use super::types::{CategoricalEncoder, JoinedEvent, TransactionEvent};

/// Columns the transaction source must provide.
pub const TRANSACTION_COLUMNS: &[&str] = &[
    "client_id",
    "date_order",
    "date_invoice",
    "order_channel",
    "branch_id",
    "product_id",
    "sales_net",
];

/// Columns the relationship source must provide.
pub const RELATION_COLUMNS: &[&str] = &["client_id", "quali_relation"];

/// Loader for the transaction and relationship sources.
pub struct DataLoader {
    transactions_path: PathBuf,
    relations_path: PathBuf,
}

impl DataLoader {
    pub fn new(transactions_path: &Path, relations_path: &Path) -> Self {
        Self {
            transactions_path: transactions_path.to_path_buf(),
            relations_path: relations_path.to_path_buf(),
        }
    }

    /// Load and type the transaction source.
    pub fn load_transactions(&self) -> Result<Vec<TransactionEvent>> {
        if !self.transactions_path.exists() {
            return Err(PipelineError::DataAccess(format!(
                "file not found: {}",
                self.transactions_path.display()
            )));
        }

        let df = LazyFrame::scan_parquet(&self.transactions_path, ScanArgsParquet::default())?
            .collect()?;
        for name in TRANSACTION_COLUMNS {
            require_column(&df, name)?;
        }

        let client_ids = int_values(require_column(&df, "client_id")?)?;
        let order_dates = date_values(require_column(&df, "date_order")?, "date_order")?;
        let invoice_dates = date_values(require_column(&df, "date_invoice")?, "date_invoice")?;
        let channels = str_values(require_column(&df, "order_channel")?)?;
        let branch_ids = int_values(require_column(&df, "branch_id")?)?;
        let product_ids = int_values(require_column(&df, "product_id")?)?;
        let sales = float_values(require_column(&df, "sales_net")?)?;

        let mut channel_codes = CategoricalEncoder::new();
        let mut events = Vec::with_capacity(df.height());
        let mut skipped = 0usize;

        for idx in 0..df.height() {
            let row = (
                client_ids[idx],
                order_dates[idx],
                invoice_dates[idx],
                channels[idx].as_deref(),
                branch_ids[idx],
                product_ids[idx],
                sales[idx],
            );
            match row {
                (
                    Some(client_id),
                    Some(date_order),
                    Some(date_invoice),
                    Some(channel),
                    Some(branch_id),
                    Some(product_id),
                    Some(sales_net),
                ) => events.push(TransactionEvent {
                    client_id,
                    date_order,
                    date_invoice,
                    order_channel: channel_codes.encode(channel)?,
                    branch_id,
                    product_id,
                    sales_net,
                }),
                _ => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(skipped, "dropped transaction rows with null fields");
        }
        debug!(
            rows = events.len(),
            channels = channel_codes.len(),
            "loaded transaction source"
        );
        Ok(events)
    }

    /// Load the relationship source as a client id to quality-code map.
    ///
    /// Quality codes are assigned by first appearance, matching a
    /// categorical-to-physical cast of the source column.
    pub fn load_relations(&self) -> Result<HashMap<i64, u8>> {
        if !self.relations_path.exists() {
            return Err(PipelineError::DataAccess(format!(
                "file not found: {}",
                self.relations_path.display()
            )));
        }

        let df = LazyCsvReader::new(&self.relations_path)
            .with_has_header(true)
            .finish()?
            .collect()?;
        for name in RELATION_COLUMNS {
            require_column(&df, name)?;
        }

        let client_ids = int_values(require_column(&df, "client_id")?)?;
        let qualities = str_values(require_column(&df, "quali_relation")?)?;

        let mut quality_codes = CategoricalEncoder::new();
        let mut relations = HashMap::with_capacity(df.height());
        for idx in 0..df.height() {
            if let (Some(client_id), Some(quality)) = (client_ids[idx], qualities[idx].as_deref())
            {
                relations.insert(client_id, quality_codes.encode(quality)?);
            }
        }

        debug!(
            clients = relations.len(),
            qualities = quality_codes.len(),
            "loaded relationship source"
        );
        Ok(relations)
    }

    /// Load both sources and inner join them on client id.
    pub fn load_joined(&self) -> Result<Vec<JoinedEvent>> {
        let transactions = self.load_transactions()?;
        let relations = self.load_relations()?;

        let total = transactions.len();
        let joined: Vec<JoinedEvent> = transactions
            .into_iter()
            .filter_map(|event| {
                relations
                    .get(&event.client_id)
                    .map(|&quality| JoinedEvent::new(event, quality))
            })
            .collect();

        if joined.len() < total {
            debug!(
                dropped = total - joined.len(),
                "events without a relationship record dropped by inner join"
            );
        }
        Ok(joined)
    }
}

pub(crate) fn require_column<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Column> {
    df.column(name)
        .map_err(|_| PipelineError::Schema(format!("missing column '{}'", name)))
}

/// Extract a date column, accepting either `%Y-%m-%d` strings or a physical
/// date type.
pub(crate) fn date_values(column: &Column, name: &str) -> Result<Vec<Option<NaiveDate>>> {
    if let Ok(ca) = column.str() {
        Ok(ca
            .into_iter()
            .map(|s| s.and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()))
            .collect())
    } else if let Ok(ca) = column.date() {
        Ok(ca.into_iter().map(|d| d.map(date_from_days)).collect())
    } else {
        Err(PipelineError::Schema(format!(
            "column '{}' is neither a date nor a date string",
            name
        )))
    }
}

pub(crate) fn int_values(column: &Column) -> Result<Vec<Option<i64>>> {
    let cast = column.cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

pub(crate) fn float_values(column: &Column) -> Result<Vec<Option<f64>>> {
    let cast = column.cast(&DataType::Float64)?;
    Ok(cast.f64()?.into_iter().collect())
}

pub(crate) fn str_values(column: &Column) -> Result<Vec<Option<String>>> {
    let cast = column.cast(&DataType::String)?;
    Ok(cast
        .str()?
        .into_iter()
        .map(|s| s.map(str::to_string))
        .collect())
}

/// Convert days since Unix epoch to NaiveDate.
fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_num_days_from_ce_opt(days + 719_163).unwrap_or_default()
}
