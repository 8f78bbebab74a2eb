//! Parquet cache of the processed train/test sets and csv outputs.
//!
//! Building the dataset from raw sources is the expensive part of a run, so
//! the split result can be persisted as `train.parquet` / `test.parquet` and
//! reloaded on the next run. Dates are stored as `%Y-%m-%d` strings.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::backtest::{BacktestMetrics, LivePrediction};
use crate::data::loader::{date_values, float_values, int_values, require_column};
use crate::error::Result;

use super::split::{TestRow, TrainingRow};

const TRAIN_FILE: &str = "train.parquet";
const TEST_FILE: &str = "test.parquet";

/// Persist both sets under `dir`, creating it if needed.
pub fn write_cache(dir: &Path, train: &[TrainingRow], test: &[TestRow]) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let mut train_df = train_to_dataframe(train)?;
    ParquetWriter::new(File::create(dir.join(TRAIN_FILE))?).finish(&mut train_df)?;

    let mut test_df = test_to_dataframe(test)?;
    ParquetWriter::new(File::create(dir.join(TEST_FILE))?).finish(&mut test_df)?;

    info!(dir = %dir.display(), train = train.len(), test = test.len(), "wrote dataset cache");
    Ok(())
}

/// Load both sets from `dir`, or `None` when either file is absent.
pub fn read_cache(dir: &Path) -> Result<Option<(Vec<TrainingRow>, Vec<TestRow>)>> {
    let train_path = dir.join(TRAIN_FILE);
    let test_path = dir.join(TEST_FILE);
    if !train_path.exists() || !test_path.exists() {
        return Ok(None);
    }

    let train_df =
        LazyFrame::scan_parquet(&train_path, ScanArgsParquet::default())?.collect()?;
    let test_df = LazyFrame::scan_parquet(&test_path, ScanArgsParquet::default())?.collect()?;

    let train = dataframe_to_train(&train_df)?;
    let test = dataframe_to_test(&test_df)?;
    info!(train = train.len(), test = test.len(), "loaded dataset cache");
    Ok(Some((train, test)))
}

/// Write live predictions as csv: one record per test client.
pub fn write_predictions(path: &Path, predictions: &[LivePrediction]) -> Result<()> {
    let mut df = DataFrame::new(vec![
        Column::new(
            "client_id".into(),
            predictions.iter().map(|p| p.client_id).collect::<Vec<i64>>(),
        ),
        Column::new(
            "predicted_churn".into(),
            predictions
                .iter()
                .map(|p| p.predicted_churn as u32)
                .collect::<Vec<u32>>(),
        ),
        Column::new(
            "predicted_churn_probability".into(),
            predictions.iter().map(|p| p.probability).collect::<Vec<f64>>(),
        ),
    ])?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

/// Append one backtest result line to the csv log, creating it with a
/// header on first use.
pub fn append_result_log(path: &Path, metrics: &BacktestMetrics) -> Result<()> {
    let new = !path.exists();
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    if new {
        writeln!(file, "model,accuracy,precision,recall")?;
    }
    writeln!(
        file,
        "{},{},{},{}",
        metrics.model, metrics.accuracy, metrics.precision, metrics.recall
    )?;
    Ok(())
}

fn train_to_dataframe(rows: &[TrainingRow]) -> Result<DataFrame> {
    let mut columns = shared_columns(rows.iter().map(row_fields_train));
    columns.push(Column::new(
        "churn".into(),
        rows.iter().map(|r| r.churn as u32).collect::<Vec<u32>>(),
    ));
    Ok(DataFrame::new(columns)?)
}

fn test_to_dataframe(rows: &[TestRow]) -> Result<DataFrame> {
    Ok(DataFrame::new(shared_columns(
        rows.iter().map(row_fields_test),
    ))?)
}

/// The label-free fields of a row, in cache column order.
type RowFields = (i64, String, [f64; TrainingRow::FEATURE_COUNT]);

fn row_fields_train(row: &TrainingRow) -> RowFields {
    (
        row.client_id,
        row.period.format("%Y-%m-%d").to_string(),
        row.features(),
    )
}

fn row_fields_test(row: &TestRow) -> RowFields {
    (
        row.client_id,
        row.period.format("%Y-%m-%d").to_string(),
        row.features(),
    )
}

const FEATURE_NAMES: [&str; TrainingRow::FEATURE_COUNT] = [
    "sales_net",
    "order_gap",
    "n_channels",
    "n_branches",
    "n_products",
    "n_orders",
    "payment_delay",
    "sales_change",
    "order_gap_change",
    "channel_change",
    "product_change",
    "order_count_change",
    "payment_delay_change",
    "quali_relation",
    "client_age",
];

fn shared_columns(rows: impl Iterator<Item = RowFields>) -> Vec<Column> {
    let mut client_ids: Vec<i64> = Vec::new();
    let mut dates: Vec<String> = Vec::new();
    let mut features: Vec<Vec<f64>> = vec![Vec::new(); TrainingRow::FEATURE_COUNT];

    for (client_id, date, values) in rows {
        client_ids.push(client_id);
        dates.push(date);
        for (column, value) in features.iter_mut().zip(values) {
            column.push(value);
        }
    }

    let mut columns = vec![
        Column::new("client_id".into(), client_ids),
        Column::new("date".into(), dates),
    ];
    for (name, values) in FEATURE_NAMES.iter().zip(features) {
        columns.push(Column::new((*name).into(), values));
    }
    columns
}

fn dataframe_to_train(df: &DataFrame) -> Result<Vec<TrainingRow>> {
    let churn = int_values(require_column(df, "churn")?)?;
    let shared = extract_shared(df)?;

    Ok(shared
        .into_iter()
        .enumerate()
        .map(|(idx, (client_id, period, f))| TrainingRow {
            client_id,
            period,
            sales_net: f[0],
            order_gap: f[1],
            n_channels: f[2] as u32,
            n_branches: f[3] as u32,
            n_products: f[4] as u32,
            n_orders: f[5] as u32,
            payment_delay: f[6],
            sales_change: f[7],
            order_gap_change: f[8],
            channel_change: f[9],
            product_change: f[10],
            order_count_change: f[11],
            payment_delay_change: f[12],
            quali_relation: f[13] as u8,
            client_age: f[14] as i64,
            churn: churn[idx].unwrap_or(0) as u8,
        })
        .collect())
}

fn dataframe_to_test(df: &DataFrame) -> Result<Vec<TestRow>> {
    Ok(extract_shared(df)?
        .into_iter()
        .map(|(client_id, period, f)| TestRow {
            client_id,
            period,
            sales_net: f[0],
            order_gap: f[1],
            n_channels: f[2] as u32,
            n_branches: f[3] as u32,
            n_products: f[4] as u32,
            n_orders: f[5] as u32,
            payment_delay: f[6],
            sales_change: f[7],
            order_gap_change: f[8],
            channel_change: f[9],
            product_change: f[10],
            order_count_change: f[11],
            payment_delay_change: f[12],
            quali_relation: f[13] as u8,
            client_age: f[14] as i64,
        })
        .collect())
}

type SharedRow = (i64, chrono::NaiveDate, [f64; TrainingRow::FEATURE_COUNT]);

fn extract_shared(df: &DataFrame) -> Result<Vec<SharedRow>> {
    let client_ids = int_values(require_column(df, "client_id")?)?;
    let dates = date_values(require_column(df, "date")?, "date")?;

    let mut feature_columns = Vec::with_capacity(TrainingRow::FEATURE_COUNT);
    for name in FEATURE_NAMES {
        feature_columns.push(float_values(require_column(df, name)?)?);
    }

    let mut rows = Vec::with_capacity(df.height());
    for idx in 0..df.height() {
        let (Some(client_id), Some(period)) = (client_ids[idx], dates[idx]) else {
            continue;
        };
        let mut features = [0.0; TrainingRow::FEATURE_COUNT];
        for (slot, column) in features.iter_mut().zip(&feature_columns) {
            *slot = column[idx].unwrap_or(0.0);
        }
        rows.push((client_id, period, features));
    }
    Ok(rows)
}
