use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::fx_source::{FxRate, FxRateSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "eqsnap/1.0";
const RATES_ENDPOINT: &str = "/stats/eurofxref/eurofxref-hist.csv";

/// Historical euro foreign exchange reference rates published by the
/// ECB as one wide CSV: one row per date, one column per currency,
/// values in units of that currency per euro. Missing rates appear as
/// `N/A`.
pub struct EcbProvider {
    base_url: String,
}

impl EcbProvider {
    pub fn new(base_url: &str) -> Self {
        EcbProvider {
            base_url: base_url.to_string(),
        }
    }
}

#[async_trait]
impl FxRateSource for EcbProvider {
    #[instrument(name = "EcbRatesFetch", skip(self, currencies))]
    async fn fetch_rates(&self, currencies: &[String]) -> Result<Vec<FxRate>> {
        let url = format!("{}{}", self.base_url, RATES_ENDPOINT);
        debug!("Requesting reference rates from {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for reference rate request",
                response.status()
            ));
        }

        let body = response.text().await?;
        parse_rates(&body, currencies)
    }
}

/// Restricts the wide CSV to the whitelisted currency codes and
/// reshapes it into long-form records sorted by (currency, date).
/// Rows with a missing rate for a currency are dropped for that
/// currency only.
fn parse_rates(body: &str, currencies: &[String]) -> Result<Vec<FxRate>> {
    // The feed carries a trailing comma, so rows are one field longer
    // than the header.
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .context("Reference rate CSV has no header row")?
        .clone();

    let date_index = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("date"))
        .ok_or_else(|| anyhow!("Reference rate data has no Date column"))?;

    let mut columns: Vec<(usize, String)> = Vec::new();
    for code in currencies {
        let code = code.trim();
        let index = headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(code))
            .ok_or_else(|| anyhow!("Currency {} not present in reference rate data", code))?;
        columns.push((index, code.to_uppercase()));
    }

    let mut rates = Vec::new();
    for record in reader.records() {
        let record = record.context("Malformed reference rate CSV row")?;
        let Some(date_field) = record.get(date_index) else {
            continue;
        };
        let date = NaiveDate::parse_from_str(date_field.trim(), "%Y-%m-%d")
            .with_context(|| format!("Unparseable reference rate date: {date_field}"))?;

        for (index, code) in &columns {
            let Some(raw) = record.get(*index) else {
                continue;
            };
            let Ok(rate) = raw.trim().parse::<f64>() else {
                continue; // N/A and blank cells drop out here
            };
            rates.push(FxRate {
                date,
                currency: code.clone(),
                rate,
            });
        }
    }

    rates.sort_by(|a, b| (a.currency.as_str(), a.date).cmp(&(b.currency.as_str(), b.date)));
    Ok(rates)
}
