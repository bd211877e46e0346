//! Transform stage: currency normalization and return statistics.

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::fx_source::FxRate;
use crate::table::{PriceTable, carry_forward, daily_calendar};

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// One observed daily return, long form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReturn {
    pub date: NaiveDate,
    pub ticker: String,
    #[serde(rename = "return")]
    pub value: f64,
}

/// Aggregate statistics over one ticker's daily returns. Volatility is
/// the sample (n−1) estimator and stays unset below two observations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickerMetrics {
    pub ticker: String,
    pub days: usize,
    pub mean_return: f64,
    pub vol: Option<f64>,
    pub max_drawdown: f64,
    pub mean_return_annual: f64,
    pub vol_annual: Option<f64>,
}

/// Converts a price table quoted in `source_currency` into
/// `base_currency` using official reference rates via a cross rate.
///
/// The output table has a contiguous daily calendar with prices and
/// rates carried forward into gaps, never interpolated. Days before
/// the first available cross rate stay unconverted and are absent from
/// the output. When the two currencies already match the table passes
/// through unchanged.
pub fn to_base_currency(
    prices: &PriceTable,
    fx: &[FxRate],
    base_currency: &str,
    source_currency: &str,
) -> Result<PriceTable> {
    let Some((first, last)) = prices.date_span() else {
        bail!("Price table is empty before currency conversion");
    };

    if source_currency.eq_ignore_ascii_case(base_currency) {
        return Ok(prices.clone());
    }

    let to_base = rates_for(fx, base_currency);
    let to_source = rates_for(fx, source_currency);

    // Inner join on date: the cross rate exists only where both series
    // quote against the shared reference currency.
    let mut cross: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, base_rate) in &to_base {
        if let Some(source_rate) = to_source.get(date) {
            cross.insert(*date, base_rate / source_rate);
        }
    }
    if cross.is_empty() {
        bail!(
            "No overlapping reference rate dates for {}/{}",
            base_currency,
            source_currency
        );
    }

    let calendar = daily_calendar(first, last);
    let rate_by_day = carry_forward(&cross, &calendar);

    let mut rows: BTreeMap<NaiveDate, HashMap<String, f64>> = BTreeMap::new();
    for ticker in prices.tickers() {
        let observed: BTreeMap<NaiveDate, f64> = prices.column(ticker).into_iter().collect();
        let filled = carry_forward(&observed, &calendar);
        for ((day, price), rate) in calendar.iter().zip(filled).zip(rate_by_day.iter()) {
            let (Some(price), Some(rate)) = (price, rate) else {
                continue;
            };
            rows.entry(*day).or_default().insert(ticker.clone(), price * rate);
        }
    }

    Ok(PriceTable::from_columns(prices.tickers().to_vec(), rows))
}

fn rates_for(fx: &[FxRate], currency: &str) -> BTreeMap<NaiveDate, f64> {
    fx.iter()
        .filter(|r| r.currency.eq_ignore_ascii_case(currency))
        .map(|r| (r.date, r.rate))
        .collect()
}

/// Derives long-form daily returns and per-ticker aggregates from a
/// base-currency price table. A ticker's first observation carries no
/// return; a ticker without any return gets no metrics row.
pub fn compute_returns(prices: &PriceTable) -> (Vec<DailyReturn>, Vec<TickerMetrics>) {
    let mut daily = Vec::new();
    let mut metrics = Vec::new();

    for ticker in prices.tickers() {
        let observations = prices.column(ticker);
        let mut returns = Vec::new();
        for pair in observations.windows(2) {
            let (_, previous) = pair[0];
            let (date, current) = pair[1];
            returns.push(DailyReturn {
                date,
                ticker: ticker.clone(),
                value: current / previous - 1.0,
            });
        }
        if returns.is_empty() {
            continue;
        }
        metrics.push(aggregate(ticker, &returns));
        daily.extend(returns);
    }

    metrics.sort_by(|a, b| a.ticker.cmp(&b.ticker));
    (daily, metrics)
}

fn aggregate(ticker: &str, returns: &[DailyReturn]) -> TickerMetrics {
    let days = returns.len();
    let mean = returns.iter().map(|r| r.value).sum::<f64>() / days as f64;

    let vol = if days > 1 {
        let squared_deviations: f64 = returns.iter().map(|r| (r.value - mean).powi(2)).sum();
        Some((squared_deviations / (days - 1) as f64).sqrt())
    } else {
        None
    };

    let mut cumulative = 1.0f64;
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown = 0.0f64;
    for r in returns {
        cumulative *= 1.0 + r.value;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.min(cumulative / peak - 1.0);
    }

    TickerMetrics {
        ticker: ticker.to_string(),
        days,
        mean_return: mean,
        vol,
        max_drawdown,
        mean_return_annual: mean * TRADING_DAYS_PER_YEAR,
        vol_annual: vol.map(|v| v * TRADING_DAYS_PER_YEAR.sqrt()),
    }
}
