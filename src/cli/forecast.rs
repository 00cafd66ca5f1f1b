use super::ui;
use crate::core::forecast::{TrendProjection, linear_trend};
use crate::core::series::DataSource;
use crate::core::store::SeriesStore;
use anyhow::{Result, bail};
use comfy_table::{Cell, CellAlignment};

pub fn project(
    store: &dyn SeriesStore,
    source: DataSource,
    name: &str,
    months: usize,
) -> Result<TrendProjection> {
    let series = store.load_series(source)?.series(name);
    if series.is_empty() {
        bail!("No series named '{name}' staged for {source}");
    }
    match linear_trend(&series, months) {
        Some(trend) => Ok(trend),
        None => bail!("'{name}' needs observations on at least two dates to fit a trend"),
    }
}

pub fn run(store: &dyn SeriesStore, source: DataSource, name: &str, months: usize) -> Result<()> {
    let trend = project(store, source, name, months)?;

    println!(
        "\n{}",
        ui::style_text(&format!("{name} linear trend"), ui::StyleType::Title)
    );
    println!(
        "{} {:+.6} per day",
        ui::style_text("Slope:", ui::StyleType::TotalLabel),
        trend.slope
    );

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Month end"), ui::header_cell("Projected")]);
    for (period, value) in &trend.points {
        table.add_row(vec![
            Cell::new(period),
            Cell::new(format!("{value:.4}")).set_alignment(CellAlignment::Right),
        ]);
    }
    println!("{table}");
    Ok(())
}
