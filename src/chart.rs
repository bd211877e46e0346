//! Renders the equity-curve chart for a base-currency price table.

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use plotters::prelude::*;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::table::PriceTable;

const CHART_SIZE: (u32, u32) = (1100, 500);

fn render_error<E: std::fmt::Display>(error: E) -> anyhow::Error {
    anyhow!("Chart rendering failed: {error}")
}

/// Draws one line per ticker of price history in the base currency.
pub fn plot_equity_curves(prices: &PriceTable, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let Some((first, last)) = prices.date_span() else {
        bail!("Nothing to plot: price table is empty");
    };

    let curves: Vec<(String, Vec<(NaiveDate, f64)>)> = prices
        .tickers()
        .iter()
        .map(|ticker| (ticker.clone(), prices.column(ticker)))
        .filter(|(_, points)| !points.is_empty())
        .collect();

    let (mut low, mut high) = (f64::INFINITY, f64::NEG_INFINITY);
    for (_, points) in &curves {
        for (_, value) in points {
            low = low.min(*value);
            high = high.max(*value);
        }
    }
    if low >= high {
        // A flat (or single-point) series still needs a visible axis.
        high = low + 1.0;
    }

    let root = BitMapBackend::new(out_path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Equity Curves (in base currency)", ("sans-serif", 22))
        .margin(12)
        .x_label_area_size(36)
        .y_label_area_size(56)
        .build_cartesian_2d(first..last, low..high)
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .x_desc("Date")
        .y_desc("Price")
        .draw()
        .map_err(render_error)?;

    for (index, (ticker, points)) in curves.iter().enumerate() {
        let color = Palette99::pick(index).mix(0.9);
        chart
            .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))
            .map_err(render_error)?
            .label(ticker.clone())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 18, y)], color.stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .border_style(BLACK)
        .background_style(WHITE.mix(0.8))
        .draw()
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    debug!("Wrote equity curve chart to {}", out_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::price_source::PriceSeries;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_renders_png_for_two_tickers() {
        let table = PriceTable::from_series(vec![
            PriceSeries::from_observations(
                "AAA",
                vec![
                    (date(2024, 1, 2), Some(100.0)),
                    (date(2024, 1, 3), Some(110.0)),
                    (date(2024, 1, 4), Some(99.0)),
                ],
            ),
            PriceSeries::from_observations(
                "BBB",
                vec![(date(2024, 1, 2), Some(50.0)), (date(2024, 1, 4), Some(55.0))],
            ),
        ]);

        let tmp = tempfile::tempdir().unwrap();
        let out_path = tmp.path().join("figures").join("equity_curves.png");

        plot_equity_curves(&table, &out_path).unwrap();

        let metadata = fs::metadata(&out_path).unwrap();
        assert!(metadata.len() > 0);
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let table = PriceTable::from_series(Vec::new());
        let tmp = tempfile::tempdir().unwrap();
        let result = plot_equity_curves(&table, &tmp.path().join("out.png"));
        assert!(result.is_err());
    }
}
