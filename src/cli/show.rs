use super::ui;
use crate::core::correlation::{CorrelationKind, CorrelationMatrix};
use crate::core::series::DataSource;
use crate::core::store::SeriesStore;
use anyhow::{Result, bail};
use comfy_table::{Cell, CellAlignment};

pub fn print_matrix(matrix: &CorrelationMatrix) {
    println!(
        "\n{}",
        ui::style_text(
            &format!("{} correlation", matrix.kind),
            ui::StyleType::Title
        )
    );

    let mut table = ui::new_styled_table();
    let mut header = vec![ui::header_cell("")];
    header.extend(matrix.columns.iter().map(|c| ui::header_cell(c)));
    table.set_header(header);

    for (name, values) in matrix.columns.iter().zip(&matrix.values) {
        let mut row = vec![ui::header_cell(name)];
        row.extend(values.iter().map(|v| ui::correlation_cell(*v)));
        table.add_row(row);
    }
    println!("{table}");
}

pub fn show_matrix(store: &dyn SeriesStore, kind: CorrelationKind) -> Result<()> {
    match store.load_matrix(kind)? {
        Some(matrix) => print_matrix(&matrix),
        None => println!(
            "{}",
            ui::style_text(
                "No correlation matrix yet. Run `macrolens correlate` first.",
                ui::StyleType::Subtle
            )
        ),
    }
    Ok(())
}

/// Without a name, lists the series staged for `source`; with one, prints its
/// observations.
pub fn show_series(store: &dyn SeriesStore, source: DataSource, name: Option<&str>) -> Result<()> {
    let table = store.load_series(source)?;
    if table.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!("Nothing staged for {source}."),
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    }

    let mut out = ui::new_styled_table();
    match name {
        None => {
            out.set_header(vec![
                ui::header_cell("Series"),
                ui::header_cell("Observations"),
                ui::header_cell("First"),
                ui::header_cell("Last"),
                ui::header_cell("Latest value"),
            ]);
            for (series, points) in table.by_name() {
                let first = points.first();
                let last = points.last();
                out.add_row(vec![
                    Cell::new(series),
                    Cell::new(points.len()).set_alignment(CellAlignment::Right),
                    ui::format_optional_cell(first, |(d, _)| d.to_string()),
                    ui::format_optional_cell(last, |(d, _)| d.to_string()),
                    ui::format_optional_cell(last, |(_, v)| format!("{v:.4}")),
                ]);
            }
        }
        Some(series) => {
            let points = table.series(series);
            if points.is_empty() {
                bail!("No series named '{series}' staged for {source}");
            }
            out.set_header(vec![ui::header_cell("Date"), ui::header_cell(series)]);
            for (date, value) in points {
                out.add_row(vec![
                    Cell::new(date),
                    Cell::new(format!("{value:.4}")).set_alignment(CellAlignment::Right),
                ]);
            }
        }
    }

    println!(
        "\n{}",
        ui::style_text(&source.to_string(), ui::StyleType::Title)
    );
    println!("{out}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::{RawObservation, SeriesTable};
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;

    #[test]
    fn test_show_series_rejects_unknown_name() {
        let store = MemoryStore::new();
        store
            .replace_series(&SeriesTable::new(
                DataSource::Yahoo,
                vec![RawObservation {
                    date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                    name: "sp500".to_string(),
                    value: 3257.85,
                }],
            ))
            .unwrap();

        assert!(show_series(&store, DataSource::Yahoo, None).is_ok());
        assert!(show_series(&store, DataSource::Yahoo, Some("sp500")).is_ok());
        let err = show_series(&store, DataSource::Yahoo, Some("gold")).unwrap_err();
        assert!(err.to_string().contains("No series named 'gold'"));
    }

    #[test]
    fn test_show_matrix_before_any_run() {
        let store = MemoryStore::new();
        assert!(show_matrix(&store, CorrelationKind::Pearson).is_ok());
    }
}
