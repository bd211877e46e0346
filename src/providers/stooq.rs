use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::price_source::{LookbackPeriod, PriceSeries, PriceSource, SampleInterval};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "eqsnap/1.0";

/// Daily quotes from the Stooq CSV endpoint. Tickers are addressed in
/// lower case with a market suffix, e.g. `aapl.us`. The endpoint
/// always serves the full available history, so the lookback period
/// cannot be narrowed at request time.
pub struct StooqProvider {
    base_url: String,
    market_suffix: String,
}

impl StooqProvider {
    pub fn new(base_url: &str, market_suffix: &str) -> Self {
        StooqProvider {
            base_url: base_url.to_string(),
            market_suffix: market_suffix.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StooqRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Close")]
    close: Option<f64>,
}

fn interval_code(interval: SampleInterval) -> &'static str {
    match interval {
        SampleInterval::Daily => "d",
        SampleInterval::Weekly => "w",
        SampleInterval::Monthly => "m",
    }
}

#[async_trait]
impl PriceSource for StooqProvider {
    fn name(&self) -> &'static str {
        "stooq"
    }

    #[instrument(
        name = "StooqSeriesFetch",
        skip(self),
        fields(ticker = %ticker)
    )]
    async fn fetch_series(
        &self,
        ticker: &str,
        _period: LookbackPeriod,
        interval: SampleInterval,
    ) -> Result<PriceSeries> {
        let symbol = format!("{}.{}", ticker.to_lowercase(), self.market_suffix);
        let url = format!(
            "{}/q/d/l/?s={}&i={}",
            self.base_url,
            symbol,
            interval_code(interval)
        );
        debug!("Requesting CSV quotes from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for ticker: {} URL: {}", e, ticker, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for ticker: {}",
                response.status(),
                ticker
            ));
        }

        let body = response.text().await?;
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let mut observations = Vec::new();
        for row in reader.deserialize::<StooqRow>() {
            let row =
                row.with_context(|| format!("Malformed quote CSV row for ticker: {ticker}"))?;
            observations.push((row.date, row.close));
        }
        Ok(PriceSeries::from_observations(ticker, observations))
    }
}
