use super::{show, ui};
use crate::core::correlation::CorrelationKind;
use crate::core::pipeline::{PipelineOptions, PipelineOutcome, run_pipeline};
use crate::core::store::SeriesStore;
use anyhow::Result;
use comfy_table::Cell;

pub fn run(store: &dyn SeriesStore, options: &PipelineOptions) -> Result<PipelineOutcome> {
    let outcome = run_pipeline(store, options)?;
    print_outcome(&outcome, options);
    Ok(outcome)
}

fn print_outcome(outcome: &PipelineOutcome, options: &PipelineOptions) {
    let panel = &outcome.artifacts.panel;

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Panel"), ui::header_cell("")]);
    table.add_row(vec![
        Cell::new("Months merged"),
        Cell::new(outcome.merged_rows),
    ]);
    table.add_row(vec![
        Cell::new(format!(
            "Rows pruned (> {:.0}% missing)",
            options.max_missing_fraction * 100.0
        )),
        Cell::new(outcome.dropped_rows),
    ]);
    table.add_row(vec![
        Cell::new("Rows kept"),
        Cell::new(panel.row_count()),
    ]);
    table.add_row(vec![
        Cell::new("Columns"),
        Cell::new(panel.column_count()),
    ]);
    if let (Some(first), Some(last)) = (panel.periods().first(), panel.periods().last()) {
        table.add_row(vec![Cell::new("Window"), Cell::new(format!("{first} .. {last}"))]);
    }
    println!("{table}");

    if !outcome.dropped_columns.is_empty() {
        println!(
            "{}",
            ui::style_text(
                &format!(
                    "Columns with no data after pruning: {}",
                    outcome.dropped_columns.join(", ")
                ),
                ui::StyleType::Warning
            )
        );
    }
    for source in &outcome.empty_sources {
        println!(
            "{}",
            ui::style_text(
                &format!("{source} has nothing staged and was left out"),
                ui::StyleType::Warning
            )
        );
    }

    for kind in CorrelationKind::ALL {
        show::print_matrix(outcome.artifacts.correlations.get(kind));
    }
}
