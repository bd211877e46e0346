//! Extraction stage: prices with provider fallback, official FX rates.

use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{
    AppConfig, DEFAULT_ECB_BASE_URL, DEFAULT_STOOQ_BASE_URL, DEFAULT_YAHOO_BASE_URL,
};
use crate::fx_source::{FxRate, FxRateSource};
use crate::price_source::{LookbackPeriod, PriceSeries, PriceSource, SampleInterval};
use crate::providers::ecb::EcbProvider;
use crate::providers::stooq::StooqProvider;
use crate::providers::util::{Backoff, with_retry};
use crate::providers::yahoo::YahooProvider;
use crate::table::PriceTable;
use crate::ui;

const BULK_RETRIES: u32 = 1;
const BULK_BACKOFF: Backoff = Backoff::Exponential(Duration::from_secs(1));
const SINGLE_ATTEMPTS: u32 = 2;
const SINGLE_BACKOFF: Backoff = Backoff::Linear(Duration::from_millis(1500));

/// Everything the transform stage needs, produced in one pass.
pub struct Extraction {
    pub prices: PriceTable,
    pub failed: Vec<String>,
    pub fx: Vec<FxRate>,
}

/// One link of the per-ticker fallback chain.
pub struct FallbackSource<'a> {
    pub source: &'a dyn PriceSource,
    pub attempts: u32,
    pub backoff: Backoff,
}

/// Runs the whole extraction stage: prices (bulk plus fallback chain),
/// then reference rates, then raw snapshots to disk.
pub async fn extract_all(config: &AppConfig) -> Result<Extraction> {
    let stocks = &config.sources.stocks;
    let period: LookbackPeriod = stocks.period.parse()?;
    let interval: SampleInterval = stocks.interval.parse()?;

    let yahoo_base = config
        .providers
        .yahoo
        .as_ref()
        .map_or(DEFAULT_YAHOO_BASE_URL, |p| &p.base_url);
    let yahoo = YahooProvider::new(yahoo_base);

    let (stooq_base, market_suffix) = config
        .providers
        .stooq
        .as_ref()
        .map_or((DEFAULT_STOOQ_BASE_URL, "us"), |p| {
            (p.base_url.as_str(), p.market_suffix.as_str())
        });
    let stooq = StooqProvider::new(stooq_base, market_suffix);

    let chain = [
        FallbackSource {
            source: &yahoo,
            attempts: SINGLE_ATTEMPTS,
            backoff: SINGLE_BACKOFF,
        },
        FallbackSource {
            source: &stooq,
            attempts: 1,
            backoff: SINGLE_BACKOFF,
        },
    ];

    let (prices, failed) =
        fetch_prices(&yahoo, &chain, &stocks.tickers, period, interval).await;
    if !failed.is_empty() {
        warn!("Failed downloads: {}", failed.join(", "));
    }
    if prices.is_empty() {
        bail!("No price data extracted for any configured ticker");
    }
    info!(
        "Extracted {} rows for {} tickers",
        prices.len(),
        prices.tickers().len()
    );

    let ecb_base = config
        .providers
        .ecb
        .as_ref()
        .map_or(DEFAULT_ECB_BASE_URL, |p| &p.base_url);
    let ecb = EcbProvider::new(ecb_base);
    let fx = ecb
        .fetch_rates(&config.sources.fx.symbols)
        .await
        .context("FX fetch failed")?;

    write_raw_snapshots(&config.paths.processed_dir, &prices, &fx)?;

    Ok(Extraction { prices, failed, fx })
}

/// Downloads the full ticker set, bulk first, then per-ticker fallback.
/// Individual failures never abort the run: they end up in the
/// returned failed list.
pub async fn fetch_prices(
    bulk: &YahooProvider,
    chain: &[FallbackSource<'_>],
    tickers: &[String],
    period: LookbackPeriod,
    interval: SampleInterval,
) -> (PriceTable, Vec<String>) {
    let mut bulk_series =
        match with_retry(|| bulk.fetch_bulk(tickers, period, interval), BULK_RETRIES, BULK_BACKOFF)
            .await
        {
            Ok(series) => series,
            Err(e) => {
                warn!("Bulk price request failed, falling back per ticker: {e}");
                HashMap::new()
            }
        };

    let pb = ui::new_progress_bar(tickers.len() as u64, false);
    let mut series = Vec::new();
    let mut failed = Vec::new();
    for ticker in tickers {
        let resolved = match bulk_series.remove(ticker) {
            Some(s) if !s.is_empty() => Some(s),
            _ => fetch_one(chain, ticker, period, interval).await,
        };
        match resolved {
            Some(s) => series.push(s),
            None => failed.push(ticker.clone()),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    (PriceTable::from_series(series), failed)
}

/// Tries each fallback link in order until one yields a non-empty
/// series. Errors retry up to the link's attempt budget; an empty
/// series is not transient and moves straight to the next link.
async fn fetch_one(
    chain: &[FallbackSource<'_>],
    ticker: &str,
    period: LookbackPeriod,
    interval: SampleInterval,
) -> Option<PriceSeries> {
    for link in chain {
        let mut attempt = 1;
        loop {
            match link.source.fetch_series(ticker, period, interval).await {
                Ok(series) if !series.is_empty() => return Some(series),
                Ok(_) => {
                    debug!("{} returned an empty series for {}", link.source.name(), ticker);
                    break;
                }
                Err(e) => {
                    debug!("{} failed for {}: {}", link.source.name(), ticker, e);
                }
            }
            if attempt >= link.attempts {
                break;
            }
            tokio::time::sleep(link.backoff.delay(attempt)).await;
            attempt += 1;
        }
    }
    None
}

/// Raw snapshots mirror what the providers returned, before any
/// transformation. Useful when a run needs a post-mortem.
fn write_raw_snapshots(dir: &Path, prices: &PriceTable, fx: &[FxRate]) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

    let path = dir.join("stocks_raw.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    let mut header = vec!["date".to_string()];
    header.extend(prices.tickers().iter().cloned());
    writer.write_record(&header)?;
    for date in prices.dates() {
        let mut record = vec![date.to_string()];
        for ticker in prices.tickers() {
            record.push(
                prices
                    .value(date, ticker)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;

    let path = dir.join("fx_raw.csv");
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    for rate in fx {
        writer.serialize(rate)?;
    }
    writer.flush()?;

    debug!("Wrote raw snapshots to {}", dir.display());
    Ok(())
}
