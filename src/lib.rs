pub mod chart;
pub mod config;
pub mod extract;
pub mod fx_source;
pub mod load;
pub mod log;
pub mod price_source;
pub mod providers;
pub mod table;
pub mod transform;
pub mod ui;

use anyhow::Result;
use tracing::{debug, info};

/// Runs the full pipeline: extract, normalize to the base currency,
/// compute returns, persist, render. Stages run strictly in sequence;
/// each output is fully materialized before the next stage starts.
pub async fn run(config_path: Option<&str>) -> Result<()> {
    info!("Equity snapshot pipeline starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    println!("{}", ui::style_text("Extract", ui::StyleType::Title));
    let extraction = extract::extract_all(&config).await?;
    if !extraction.failed.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("Failed downloads: {}", extraction.failed.join(", ")),
                ui::StyleType::Error
            )
        );
    }

    println!("{}", ui::style_text("Transform", ui::StyleType::Title));
    let prices_base = transform::to_base_currency(
        &extraction.prices,
        &extraction.fx,
        &config.project.base_currency,
        &config.sources.stocks.currency,
    )?;
    let (daily, metrics) = transform::compute_returns(&prices_base);

    println!("{}", ui::style_text("Load", ui::StyleType::Title));
    load::save_outputs(&daily, &metrics, &config.paths)?;

    println!("{}", ui::style_text("Visualize", ui::StyleType::Title));
    let out_png = config.paths.figures_dir.join("equity_curves.png");
    chart::plot_equity_curves(&prices_base, &out_png)?;

    ui::display_metrics(&metrics);
    info!("Pipeline run complete");
    Ok(())
}
