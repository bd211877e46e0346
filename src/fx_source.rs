//! Exchange-rate abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One official reference rate: how many units of `currency` equal one
/// unit of the reference currency (EUR for the ECB feed) on `date`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxRate {
    pub date: NaiveDate,
    pub currency: String,
    pub rate: f64,
}

#[async_trait]
pub trait FxRateSource: Send + Sync {
    /// Fetch daily rates for the given currency codes, sorted by
    /// (currency, date). Partial data is not tolerated: any fetch or
    /// parse problem is an error.
    async fn fetch_rates(&self, currencies: &[String]) -> Result<Vec<FxRate>>;
}
