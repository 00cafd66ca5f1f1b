//! The batch pipeline: staged tables -> aligned series -> pruned panel -> correlation matrices.
use crate::core::align::{self, AlignedSeries};
use crate::core::correlation;
use crate::core::error::{PipelineError, Result};
use crate::core::panel::{DEFAULT_MAX_MISSING_FRACTION, Panel, PrunedPanel};
use crate::core::series::{DataSource, SeriesTable};
use crate::core::store::{Artifacts, SeriesStore};
use tracing::{info, instrument, warn};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_missing_fraction: f64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_missing_fraction: DEFAULT_MAX_MISSING_FRACTION,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub artifacts: Artifacts,
    /// Panel rows before the missingness prune.
    pub merged_rows: usize,
    pub dropped_rows: usize,
    pub dropped_columns: Vec<String>,
    pub empty_sources: Vec<DataSource>,
}

/// Aligns every table onto month-ends, merges and prunes.
pub fn build_panel(
    tables: &[SeriesTable],
    max_missing_fraction: f64,
) -> Result<(Panel, PrunedPanel)> {
    let horizon = align::horizon(tables);
    let aligned: Vec<AlignedSeries> = tables
        .iter()
        .flat_map(|table| align::align_table(table, horizon))
        .collect();

    let merged = Panel::merge(aligned);
    let pruned = merged.prune(max_missing_fraction)?;
    Ok((merged, pruned))
}

/// Recomputes the panel and both matrices from the current staged snapshot.
///
/// The artifacts are replaced only when every step succeeds; a failed run
/// leaves the previous artifacts untouched.
#[instrument(
    name = "CorrelationPipeline",
    skip_all,
    fields(max_missing = options.max_missing_fraction)
)]
pub fn run_pipeline(store: &dyn SeriesStore, options: &PipelineOptions) -> Result<PipelineOutcome> {
    let mut tables = Vec::with_capacity(DataSource::ALL.len());
    let mut empty_sources = Vec::new();

    for source in DataSource::ALL {
        let table = store.load_series(source)?;
        if table.is_empty() {
            warn!("{}; continuing without it", PipelineError::EmptySource(source));
            empty_sources.push(source);
            continue;
        }
        info!(%source, rows = table.len(), "Loaded staged table");
        tables.push(table);
    }

    let (merged, pruned) = build_panel(&tables, options.max_missing_fraction)?;
    let correlations = correlation::correlate(&pruned.panel)?;

    let artifacts = Artifacts {
        panel: pruned.panel,
        correlations,
    };
    store.replace_artifacts(&artifacts)?;
    info!(
        columns = artifacts.panel.column_count(),
        rows = artifacts.panel.row_count(),
        "Replaced correlation artifacts"
    );

    Ok(PipelineOutcome {
        artifacts,
        merged_rows: merged.row_count(),
        dropped_rows: pruned.dropped_rows,
        dropped_columns: pruned.dropped_columns,
        empty_sources,
    })
}
