use anyhow::Result;
use clap::{Parser, Subcommand};
use eqsnap::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the full extract-transform-load pipeline (the default)
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(Commands::Run) | None => eqsnap::run(cli.config_path.as_deref()).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Pipeline failed");
    }
    result
}

fn setup() -> Result<()> {
    use anyhow::Context;

    let path = eqsnap::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
project:
  base_currency: "PLN"

sources:
  stocks:
    tickers: ["AAPL", "MSFT", "KO"]
    period: "1y"
    interval: "1d"
    currency: "USD"
  fx:
    symbols: ["USD", "PLN"]

paths:
  processed_dir: "data/processed"
  warehouse_db: "data/warehouse.duckdb"
  figures_dir: "reports/figures"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    println!("Created default configuration at {}", path.display());
    Ok(())
}
