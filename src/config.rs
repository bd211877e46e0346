use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_STOOQ_BASE_URL: &str = "https://stooq.com";
pub const DEFAULT_ECB_BASE_URL: &str = "https://www.ecb.europa.eu";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProjectConfig {
    /// Currency all reported prices and returns are expressed in.
    pub base_currency: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StocksConfig {
    pub tickers: Vec<String>,
    /// Lookback window, e.g. "1y".
    pub period: String,
    /// Sampling interval, e.g. "1d".
    pub interval: String,
    /// Currency the source quotes prices in.
    #[serde(default = "default_quote_currency")]
    pub currency: String,
}

fn default_quote_currency() -> String {
    "USD".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FxConfig {
    /// Currency codes to keep from the reference rate feed. Must cover
    /// both the quote currency and the base currency.
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourcesConfig {
    pub stocks: StocksConfig,
    pub fx: FxConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PathsConfig {
    pub processed_dir: PathBuf,
    pub warehouse_db: PathBuf,
    pub figures_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StooqProviderConfig {
    pub base_url: String,
    #[serde(default = "default_stooq_market")]
    pub market_suffix: String,
}

fn default_stooq_market() -> String {
    "us".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EcbProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
    pub stooq: Option<StooqProviderConfig>,
    pub ecb: Option<EcbProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            }),
            stooq: Some(StooqProviderConfig {
                base_url: DEFAULT_STOOQ_BASE_URL.to_string(),
                market_suffix: default_stooq_market(),
            }),
            ecb: Some(EcbProviderConfig {
                base_url: DEFAULT_ECB_BASE_URL.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub project: ProjectConfig,
    pub sources: SourcesConfig,
    pub paths: PathsConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "eqsnap", "eqsnap")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
project:
  base_currency: "PLN"
sources:
  stocks:
    tickers: ["AAPL", "MSFT"]
    period: "1y"
    interval: "1d"
  fx:
    symbols: ["USD", "PLN"]
paths:
  processed_dir: "data/processed"
  warehouse_db: "data/warehouse.duckdb"
  figures_dir: "reports/figures"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.project.base_currency, "PLN");
        assert_eq!(config.sources.stocks.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.sources.stocks.period, "1y");
        assert_eq!(config.sources.stocks.currency, "USD");
        assert_eq!(config.sources.fx.symbols.len(), 2);
        assert_eq!(
            config.paths.warehouse_db,
            PathBuf::from("data/warehouse.duckdb")
        );
        assert!(config.providers.yahoo.is_some());
        assert_eq!(
            config.providers.yahoo.unwrap().base_url,
            DEFAULT_YAHOO_BASE_URL
        );
        assert_eq!(config.providers.stooq.unwrap().market_suffix, "us");

        let yaml_str_with_providers = r#"
project:
  base_currency: "USD"
sources:
  stocks:
    tickers: ["KO"]
    period: "6mo"
    interval: "1d"
    currency: "USD"
  fx:
    symbols: ["USD"]
paths:
  processed_dir: "p"
  warehouse_db: "w.duckdb"
  figures_dir: "f"
providers:
  yahoo:
    base_url: "http://example.com/yahoo"
  stooq:
    base_url: "http://example.com/stooq"
    market_suffix: "uk"
  ecb:
    base_url: "http://example.com/ecb"
"#;
        let config_with_providers: AppConfig =
            serde_yaml::from_str(yaml_str_with_providers).unwrap();
        assert_eq!(
            config_with_providers.providers.yahoo.unwrap().base_url,
            "http://example.com/yahoo"
        );
        let stooq = config_with_providers.providers.stooq.unwrap();
        assert_eq!(stooq.base_url, "http://example.com/stooq");
        assert_eq!(stooq.market_suffix, "uk");
        assert_eq!(
            config_with_providers.providers.ecb.unwrap().base_url,
            "http://example.com/ecb"
        );
    }
}
