use super::ui;
use crate::core::series::{DataSource, TableSummary};
use crate::core::store::SeriesStore;
use anyhow::Result;
use comfy_table::{Cell, CellAlignment};

pub fn summarize(store: &dyn SeriesStore) -> Result<Vec<TableSummary>> {
    DataSource::ALL
        .iter()
        .map(|source| Ok(store.load_series(*source)?.summary()))
        .collect()
}

/// Prints what is staged per source and whether artifacts exist.
pub fn run(store: &dyn SeriesStore) -> Result<()> {
    let summaries = summarize(store)?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Source"),
        ui::header_cell("Series"),
        ui::header_cell("Rows"),
        ui::header_cell("First"),
        ui::header_cell("Last"),
    ]);
    for s in &summaries {
        table.add_row(vec![
            Cell::new(s.source.to_string()),
            Cell::new(s.series).set_alignment(CellAlignment::Right),
            Cell::new(s.rows).set_alignment(CellAlignment::Right),
            ui::format_optional_cell(s.first_date, |d| d.to_string()),
            ui::format_optional_cell(s.last_date, |d| d.to_string()),
        ]);
    }
    println!(
        "{}",
        ui::style_text("Staged tables", ui::StyleType::Title)
    );
    println!("{table}");

    match store.load_panel()? {
        Some(panel) => println!(
            "{} {} months x {} columns",
            ui::style_text("Panel:", ui::StyleType::TotalLabel),
            ui::style_text(&panel.row_count().to_string(), ui::StyleType::TotalValue),
            ui::style_text(&panel.column_count().to_string(), ui::StyleType::TotalValue),
        ),
        None => println!(
            "{}",
            ui::style_text("No panel computed yet.", ui::StyleType::Subtle)
        ),
    }
    Ok(())
}
