//! Load stage: flat files and the DuckDB warehouse.

use anyhow::{Context, Result};
use duckdb::Connection;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::config::PathsConfig;
use crate::transform::{DailyReturn, TickerMetrics};

const SCHEMA: &str = r#"
CREATE OR REPLACE TABLE fact_returns_daily (
    date DATE NOT NULL,
    ticker VARCHAR NOT NULL,
    "return" DOUBLE NOT NULL
);

CREATE OR REPLACE TABLE dim_ticker_metrics (
    ticker VARCHAR NOT NULL,
    days BIGINT NOT NULL,
    mean_return DOUBLE NOT NULL,
    vol DOUBLE,
    max_drawdown DOUBLE NOT NULL,
    mean_return_annual DOUBLE NOT NULL,
    vol_annual DOUBLE
);
"#;

/// Persists both output tables to CSV flat files and the warehouse.
/// Each run fully replaces the previous snapshot.
pub fn save_outputs(
    daily: &[DailyReturn],
    metrics: &[TickerMetrics],
    paths: &PathsConfig,
) -> Result<()> {
    persist_files(daily, metrics, &paths.processed_dir)?;
    load_warehouse(daily, metrics, &paths.warehouse_db)?;
    Ok(())
}

fn persist_files(daily: &[DailyReturn], metrics: &[TickerMetrics], dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let path = dir.join("returns_daily.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    for row in daily {
        writer.serialize(row)?;
    }
    writer.flush()?;

    let path = dir.join("ticker_metrics.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    for row in metrics {
        writer.serialize(row)?;
    }
    writer.flush()?;

    debug!("Wrote flat file outputs to {}", dir.display());
    Ok(())
}

fn load_warehouse(daily: &[DailyReturn], metrics: &[TickerMetrics], db_path: &Path) -> Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let connection = Connection::open(db_path)
        .with_context(|| format!("Failed to open warehouse at {}", db_path.display()))?;
    connection.execute_batch(SCHEMA)?;

    connection.execute_batch("BEGIN TRANSACTION")?;
    let result = (|| -> Result<()> {
        for row in daily {
            let sql = format!(
                "INSERT INTO fact_returns_daily (date, ticker, \"return\") \
                 VALUES (DATE '{date}', '{ticker}', {value});",
                date = row.date,
                ticker = escape_sql_string(&row.ticker),
                value = row.value,
            );
            connection.execute_batch(&sql)?;
        }
        for row in metrics {
            let sql = format!(
                "INSERT INTO dim_ticker_metrics \
                 (ticker, days, mean_return, vol, max_drawdown, mean_return_annual, vol_annual) \
                 VALUES ('{ticker}', {days}, {mean_return}, {vol}, {max_drawdown}, \
                 {mean_return_annual}, {vol_annual});",
                ticker = escape_sql_string(&row.ticker),
                days = row.days,
                mean_return = row.mean_return,
                vol = sql_option_f64(row.vol),
                max_drawdown = row.max_drawdown,
                mean_return_annual = row.mean_return_annual,
                vol_annual = sql_option_f64(row.vol_annual),
            );
            connection.execute_batch(&sql)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            connection.execute_batch("COMMIT")?;
            debug!(
                "Loaded {} return rows and {} metric rows into {}",
                daily.len(),
                metrics.len(),
                db_path.display()
            );
            Ok(())
        }
        Err(e) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(e)
        }
    }
}

fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

fn sql_option_f64(value: Option<f64>) -> String {
    value.map_or_else(|| "NULL".to_string(), |v| v.to_string())
}
