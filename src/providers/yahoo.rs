use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::price_source::{LookbackPeriod, PriceSeries, PriceSource, SampleInterval};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = "eqsnap/1.0";

/// Yahoo Finance chart API. The spark endpoint serves the whole ticker
/// set in one request; the chart endpoint serves a single ticker.
pub struct YahooProvider {
    base_url: String,
}

impl YahooProvider {
    pub fn new(base_url: &str) -> Self {
        YahooProvider {
            base_url: base_url.to_string(),
        }
    }

    fn client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?)
    }

    /// One bulk request for the whole ticker set. Tickers the response
    /// does not cover are simply absent from the returned map; deciding
    /// what to do about them is the caller's concern.
    #[instrument(name = "YahooBulkFetch", skip(self, tickers))]
    pub async fn fetch_bulk(
        &self,
        tickers: &[String],
        period: LookbackPeriod,
        interval: SampleInterval,
    ) -> Result<HashMap<String, PriceSeries>> {
        let url = format!(
            "{}/v8/finance/spark?symbols={}&range={}&interval={}",
            self.base_url,
            tickers.join(","),
            period,
            interval
        );
        debug!("Requesting bulk price data from {}", url);

        let client = self.client()?;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for bulk URL: {}", e, url))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for bulk price request",
                response.status()
            ));
        }

        let text = response.text().await?;
        let data: SparkResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse bulk price response: {}", e))?;

        let mut series = HashMap::new();
        for SparkItem { symbol, response } in data.spark.result {
            let Some(chart) = response.into_iter().next() else {
                continue;
            };
            let s = series_from_chart(&symbol, &chart);
            if !s.is_empty() {
                series.insert(symbol, s);
            }
        }
        Ok(series)
    }
}

#[derive(Deserialize, Debug)]
struct SparkResponse {
    spark: SparkResult,
}

#[derive(Deserialize, Debug)]
struct SparkResult {
    result: Vec<SparkItem>,
}

#[derive(Deserialize, Debug)]
struct SparkItem {
    symbol: String,
    response: Vec<ChartData>,
}

#[derive(Deserialize, Debug)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Vec<ChartData>,
}

#[derive(Deserialize, Debug)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

fn series_from_chart(ticker: &str, chart: &ChartData) -> PriceSeries {
    let (Some(timestamps), Some(closes)) = (
        chart.timestamp.as_ref(),
        chart
            .indicators
            .as_ref()
            .and_then(|inds| inds.quote.first())
            .and_then(|q| q.close.as_ref()),
    ) else {
        return PriceSeries::from_observations(ticker, Vec::new());
    };

    let observations: Vec<(NaiveDate, Option<f64>)> = timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            Utc.timestamp_opt(*ts, 0)
                .single()
                .map(|dt| (dt.date_naive(), *close))
        })
        .collect();
    PriceSeries::from_observations(ticker, observations)
}

#[async_trait]
impl PriceSource for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    #[instrument(
        name = "YahooSeriesFetch",
        skip(self),
        fields(ticker = %ticker)
    )]
    async fn fetch_series(
        &self,
        ticker: &str,
        period: LookbackPeriod,
        interval: SampleInterval,
    ) -> Result<PriceSeries> {
        let url = format!(
            "{}/v8/finance/chart/{}?range={}&interval={}",
            self.base_url, ticker, period, interval
        );
        debug!("Requesting price data from {}", url);

        let client = self.client()?;
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

        let text = response.text().await?;
        let data: ChartResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse price response for {}: {}", ticker, e))?;

        let chart = data
            .chart
            .result
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No price data found for ticker: {}", ticker))?;

        Ok(series_from_chart(ticker, &chart))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // 2024-01-02, 2024-01-03, 2024-01-04 at midnight UTC
    const TS_JAN_2: i64 = 1_704_153_600;
    const TS_JAN_3: i64 = 1_704_240_000;
    const TS_JAN_4: i64 = 1_704_326_400;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn mock_chart_server(ticker: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{ticker}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    #[tokio::test]
    async fn test_single_fetch_parses_dates_and_skips_nulls() {
        let mock_response = format!(
            r#"{{
                "chart": {{
                    "result": [{{
                        "timestamp": [{TS_JAN_2}, {TS_JAN_3}, {TS_JAN_4}],
                        "indicators": {{
                            "quote": [{{
                                "close": [100.0, null, 99.0]
                            }}]
                        }}
                    }}]
                }}
            }}"#,
        );

        let mock_server = mock_chart_server("AAPL", &mock_response).await;
        let provider = YahooProvider::new(&mock_server.uri());

        let series = provider
            .fetch_series("AAPL", LookbackPeriod::OneYear, SampleInterval::Daily)
            .await
            .unwrap();

        assert_eq!(
            series.points,
            vec![(date(2024, 1, 2), 100.0), (date(2024, 1, 4), 99.0)]
        );
    }

    #[tokio::test]
    async fn test_single_fetch_no_result_is_an_error() {
        let mock_server = mock_chart_server("INVALID", r#"{"chart": {"result": []}}"#).await;
        let provider = YahooProvider::new(&mock_server.uri());

        let result = provider
            .fetch_series("INVALID", LookbackPeriod::OneYear, SampleInterval::Daily)
            .await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "No price data found for ticker: INVALID"
        );
    }

    #[tokio::test]
    async fn test_single_fetch_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let provider = YahooProvider::new(&mock_server.uri());
        let result = provider
            .fetch_series("AAPL", LookbackPeriod::OneYear, SampleInterval::Daily)
            .await;
        assert!(result.is_err());
        assert_eq!(
            result.unwrap_err().to_string(),
            "HTTP error: 500 Internal Server Error for ticker: AAPL"
        );
    }

    #[tokio::test]
    async fn test_bulk_fetch_keys_series_by_symbol() {
        let mock_response = format!(
            r#"{{
                "spark": {{
                    "result": [
                        {{
                            "symbol": "AAA",
                            "response": [{{
                                "timestamp": [{TS_JAN_2}, {TS_JAN_3}],
                                "indicators": {{"quote": [{{"close": [10.0, 11.0]}}]}}
                            }}]
                        }},
                        {{
                            "symbol": "BBB",
                            "response": [{{
                                "timestamp": [{TS_JAN_2}],
                                "indicators": {{"quote": [{{"close": [null]}}]}}
                            }}]
                        }}
                    ]
                }}
            }}"#,
        );

        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/spark"))
            .and(query_param("symbols", "AAA,BBB,CCC"))
            .respond_with(ResponseTemplate::new(200).set_body_string(&mock_response))
            .mount(&mock_server)
            .await;

        let provider = YahooProvider::new(&mock_server.uri());
        let tickers: Vec<String> = ["AAA", "BBB", "CCC"]
            .iter()
            .map(|t| t.to_string())
            .collect();
        let series = provider
            .fetch_bulk(&tickers, LookbackPeriod::OneYear, SampleInterval::Daily)
            .await
            .unwrap();

        // BBB collapses to empty after dropping nulls, CCC was never in
        // the response: only AAA survives.
        assert_eq!(series.len(), 1);
        assert_eq!(series["AAA"].points.len(), 2);
        assert_eq!(series["AAA"].points[1], (date(2024, 1, 3), 11.0));
    }

    #[tokio::test]
    async fn test_bulk_fetch_malformed_response_is_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/spark"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"sparks": []}"#))
            .mount(&mock_server)
            .await;

        let provider = YahooProvider::new(&mock_server.uri());
        let result = provider
            .fetch_bulk(
                &["AAA".to_string()],
                LookbackPeriod::OneYear,
                SampleInterval::Daily,
            )
            .await;
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse bulk price response")
        );
    }
}
