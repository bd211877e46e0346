//! Pricing abstractions and core types

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// Lookback window requested from a price source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LookbackPeriod {
    FiveDays,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
    TwoYears,
    FiveYears,
    TenYears,
    Max,
}

impl Display for LookbackPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                LookbackPeriod::FiveDays => "5d",
                LookbackPeriod::OneMonth => "1mo",
                LookbackPeriod::ThreeMonths => "3mo",
                LookbackPeriod::SixMonths => "6mo",
                LookbackPeriod::OneYear => "1y",
                LookbackPeriod::TwoYears => "2y",
                LookbackPeriod::FiveYears => "5y",
                LookbackPeriod::TenYears => "10y",
                LookbackPeriod::Max => "max",
            }
        )
    }
}

impl FromStr for LookbackPeriod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "5d" => Ok(LookbackPeriod::FiveDays),
            "1mo" => Ok(LookbackPeriod::OneMonth),
            "3mo" => Ok(LookbackPeriod::ThreeMonths),
            "6mo" => Ok(LookbackPeriod::SixMonths),
            "1y" => Ok(LookbackPeriod::OneYear),
            "2y" => Ok(LookbackPeriod::TwoYears),
            "5y" => Ok(LookbackPeriod::FiveYears),
            "10y" => Ok(LookbackPeriod::TenYears),
            "max" => Ok(LookbackPeriod::Max),
            _ => Err(anyhow::anyhow!("Invalid lookback period: {}", s)),
        }
    }
}

/// Sampling interval of a downloaded series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleInterval {
    Daily,
    Weekly,
    Monthly,
}

impl Display for SampleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                SampleInterval::Daily => "1d",
                SampleInterval::Weekly => "1wk",
                SampleInterval::Monthly => "1mo",
            }
        )
    }
}

impl FromStr for SampleInterval {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1d" => Ok(SampleInterval::Daily),
            "1wk" => Ok(SampleInterval::Weekly),
            "1mo" => Ok(SampleInterval::Monthly),
            _ => Err(anyhow::anyhow!("Invalid sample interval: {}", s)),
        }
    }
}

/// Closing prices for one ticker, oldest first. Dates are strictly
/// increasing and values are in the source's quote currency.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    pub ticker: String,
    pub points: Vec<(NaiveDate, f64)>,
}

impl PriceSeries {
    /// Builds a series from raw observations: missing values are
    /// dropped, dates sorted ascending, and the last value wins for a
    /// duplicated date.
    pub fn from_observations(ticker: &str, observations: Vec<(NaiveDate, Option<f64>)>) -> Self {
        let mut by_date = BTreeMap::new();
        for (date, value) in observations {
            if let Some(value) = value {
                by_date.insert(date, value);
            }
        }
        PriceSeries {
            ticker: ticker.to_string(),
            points: by_date.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Source name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Fetch the close series for one ticker.
    async fn fetch_series(
        &self,
        ticker: &str,
        period: LookbackPeriod,
        interval: SampleInterval,
    ) -> Result<PriceSeries>;
}
