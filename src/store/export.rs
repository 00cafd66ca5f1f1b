//! CSV export of staged tables and correlation artifacts.

use crate::core::correlation::{CorrelationKind, CorrelationMatrix};
use crate::core::panel::Panel;
use crate::core::series::{DataSource, SeriesTable};
use crate::core::store::SeriesStore;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String> {
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Square matrix with a leading label column; missing cells are left empty.
pub fn matrix_csv(matrix: &CorrelationMatrix) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec![String::new()];
    header.extend(matrix.columns.iter().cloned());
    wtr.write_record(&header)?;

    for (name, row) in matrix.columns.iter().zip(&matrix.values) {
        let mut record = vec![name.clone()];
        record.extend(row.iter().map(|v| cell(*v)));
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

pub fn panel_csv(panel: &Panel) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["date".to_string()];
    header.extend(panel.columns().iter().cloned());
    wtr.write_record(&header)?;

    for (i, period) in panel.periods().iter().enumerate() {
        let mut record = vec![period.to_string()];
        if let Some(row) = panel.row(i) {
            record.extend(row.iter().map(|v| cell(*v)));
        }
        wtr.write_record(&record)?;
    }
    finish(wtr)
}

/// Long format, one observation per line.
pub fn series_csv(table: &SeriesTable) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "name", "value"])?;
    for obs in table.observations() {
        wtr.write_record([obs.date.to_string(), obs.name.clone(), obs.value.to_string()])?;
    }
    finish(wtr)
}

pub fn matrix_file_name(kind: CorrelationKind) -> String {
    format!("{}_correlation_matrix.csv", kind.slug())
}

fn write_file(dir: &Path, name: &str, content: &str, written: &mut Vec<PathBuf>) -> Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    written.push(path);
    Ok(())
}

/// Writes every staged table plus the current panel and matrices into `dir`.
/// Artifacts that were never computed are skipped.
pub fn export_all(store: &dyn SeriesStore, dir: &Path) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let mut written = Vec::new();

    for source in DataSource::ALL {
        let table = store.load_series(source)?;
        if table.is_empty() {
            warn!("Nothing staged for {source}, skipping export");
            continue;
        }
        let name = format!("series_{}.csv", source.slug());
        write_file(dir, &name, &series_csv(&table)?, &mut written)?;
    }

    match store.load_panel()? {
        Some(panel) => write_file(dir, "panel.csv", &panel_csv(&panel)?, &mut written)?,
        None => warn!("No panel computed yet; run correlate first"),
    }

    for kind in CorrelationKind::ALL {
        if let Some(matrix) = store.load_matrix(kind)? {
            write_file(dir, &matrix_file_name(kind), &matrix_csv(&matrix)?, &mut written)?;
        }
    }

    info!(files = written.len(), "Exported to {}", dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::correlation::correlate;
    use crate::core::series::RawObservation;
    use crate::core::store::Artifacts;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn panel() -> Panel {
        let rows = (1..=4)
            .map(|m| {
                let period = NaiveDate::from_ymd_opt(2020, m, 1).unwrap();
                let b = if m == 2 { None } else { Some(10.0 - m as f64) };
                (period, vec![Some(m as f64), b, Some((m % 2) as f64)])
            })
            .collect();
        Panel::from_rows(vec!["a".into(), "b".into(), "c".into()], rows)
    }

    #[test]
    fn test_matrix_csv_layout() {
        let matrix = CorrelationMatrix {
            kind: CorrelationKind::Pearson,
            columns: vec!["x".into(), "y".into()],
            values: vec![vec![Some(1.0), Some(-0.5)], vec![Some(-0.5), None]],
        };
        assert_eq!(matrix_csv(&matrix).unwrap(), ",x,y\nx,1,-0.5\ny,-0.5,\n");
    }

    #[test]
    fn test_panel_csv_leaves_missing_cells_empty() {
        let csv = panel_csv(&panel()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,a,b,c");
        assert_eq!(lines[2], "2020-02-01,2,,0");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_export_all_writes_available_files() {
        let dir = tempdir().unwrap();
        let store = MemoryStore::new();
        store
            .replace_series(&SeriesTable::new(
                DataSource::Fred,
                vec![RawObservation {
                    date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                    name: "GDP".into(),
                    value: 21_000.5,
                }],
            ))
            .unwrap();

        let written = export_all(&store, dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("series_fred.csv")]);

        let panel = panel();
        let correlations = correlate(&panel).unwrap();
        store
            .replace_artifacts(&Artifacts {
                panel,
                correlations,
            })
            .unwrap();

        let written = export_all(&store, dir.path()).unwrap();
        assert_eq!(written.len(), 4);
        assert!(dir.path().join("pearson_correlation_matrix.csv").exists());
        assert!(dir.path().join("spearman_correlation_matrix.csv").exists());
        let series = std::fs::read_to_string(dir.path().join("series_fred.csv")).unwrap();
        assert_eq!(series, "date,name,value\n2020-01-01,GDP,21000.5\n");
    }
}
