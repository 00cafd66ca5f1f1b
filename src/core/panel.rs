//! Wide period-by-series table built from aligned series.
use crate::core::align::AlignedSeries;
use crate::core::correlation::{MIN_COLUMNS, MIN_ROWS};
use crate::core::error::{PipelineError, Result};
use crate::core::series::DataSource;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info, warn};

/// Rows with a larger share of missing cells than this are pruned by default.
pub const DEFAULT_MAX_MISSING_FRACTION: f64 = 0.4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    columns: Vec<String>,
    periods: Vec<NaiveDate>,
    rows: Vec<Vec<Option<f64>>>,
}

/// A pruned panel plus what the prune removed.
#[derive(Debug, Clone)]
pub struct PrunedPanel {
    pub panel: Panel,
    pub dropped_rows: usize,
    pub dropped_columns: Vec<String>,
}

impl Panel {
    /// Outer-joins the series on period. Columns follow source order, then
    /// input order; a name reused by a later source is qualified with its slug.
    pub fn merge(mut series: Vec<AlignedSeries>) -> Self {
        series.sort_by_key(|s| source_rank(s.source));

        let mut columns = Vec::with_capacity(series.len());
        let mut taken = HashSet::new();
        for s in &series {
            let mut column = s.name.clone();
            if !taken.insert(column.clone()) {
                column = format!("{}:{}", s.source.slug(), s.name);
                warn!(
                    series = %s.name,
                    source = %s.source,
                    column = %column,
                    "Series name already used by another source; qualifying column"
                );
                taken.insert(column.clone());
            }
            columns.push(column);
        }

        let periods: BTreeSet<NaiveDate> = series
            .iter()
            .flat_map(|s| s.values.keys().copied())
            .collect();
        let periods: Vec<NaiveDate> = periods.into_iter().collect();

        let rows = periods
            .iter()
            .map(|period| series.iter().map(|s| s.value_at(*period)).collect())
            .collect();

        debug!(
            columns = columns.len(),
            periods = periods.len(),
            "Merged aligned series into panel"
        );

        Self {
            columns,
            periods,
            rows,
        }
    }

    /// Builds a panel from explicit rows, sorting by period. Later rows replace
    /// earlier ones for the same period; short rows are padded with missing cells.
    pub fn from_rows(columns: Vec<String>, rows: Vec<(NaiveDate, Vec<Option<f64>>)>) -> Self {
        let width = columns.len();
        let by_period: BTreeMap<NaiveDate, Vec<Option<f64>>> = rows
            .into_iter()
            .map(|(period, mut cells)| {
                cells.resize(width, None);
                (period, cells)
            })
            .collect();

        Self {
            columns,
            periods: by_period.keys().copied().collect(),
            rows: by_period.into_values().collect(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    pub fn row(&self, index: usize) -> Option<&[Option<f64>]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.periods.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn column_values(&self, index: usize) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row[index]).collect()
    }

    pub fn value(&self, period: NaiveDate, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        let row = self.periods.binary_search(&period).ok()?;
        self.rows[row][col]
    }

    fn missing_fraction(&self, row: &[Option<f64>]) -> f64 {
        let missing = row.iter().filter(|cell| cell.is_none()).count();
        missing as f64 / self.columns.len() as f64
    }

    /// Drops every row whose missing share exceeds `max_missing_fraction`,
    /// then every column left without a value.
    pub fn prune(&self, max_missing_fraction: f64) -> Result<PrunedPanel> {
        if !(0.0..=1.0).contains(&max_missing_fraction) {
            return Err(PipelineError::InvalidThreshold(max_missing_fraction));
        }
        if self.columns.is_empty() {
            return Err(self.insufficient(0, 0));
        }

        let kept: Vec<usize> = (0..self.rows.len())
            .filter(|i| self.missing_fraction(&self.rows[*i]) <= max_missing_fraction)
            .collect();
        let dropped_rows = self.rows.len() - kept.len();

        if kept.is_empty() {
            warn!(
                rows = self.rows.len(),
                threshold = max_missing_fraction,
                "Missingness prune removed every row"
            );
            return Err(self.insufficient(0, self.columns.len()));
        }

        let (live, dead): (Vec<usize>, Vec<usize>) = (0..self.columns.len())
            .partition(|c| kept.iter().any(|r| self.rows[*r][*c].is_some()));
        let dropped_columns: Vec<String> = dead.iter().map(|c| self.columns[*c].clone()).collect();

        let panel = Panel {
            columns: live.iter().map(|c| self.columns[*c].clone()).collect(),
            periods: kept.iter().map(|r| self.periods[*r]).collect(),
            rows: kept
                .iter()
                .map(|r| live.iter().map(|c| self.rows[*r][*c]).collect())
                .collect(),
        };

        info!(
            kept_rows = panel.row_count(),
            dropped_rows,
            dropped_columns = dropped_columns.len(),
            threshold = max_missing_fraction,
            "Pruned panel"
        );

        Ok(PrunedPanel {
            panel,
            dropped_rows,
            dropped_columns,
        })
    }

    fn insufficient(&self, rows: usize, columns: usize) -> PipelineError {
        PipelineError::InsufficientPanelData {
            rows,
            columns,
            min_rows: MIN_ROWS,
            min_columns: MIN_COLUMNS,
        }
    }
}

fn source_rank(source: DataSource) -> usize {
    DataSource::ALL
        .iter()
        .position(|s| *s == source)
        .unwrap_or(DataSource::ALL.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn aligned(source: DataSource, name: &str, cells: &[(&str, Option<f64>)]) -> AlignedSeries {
        AlignedSeries {
            source,
            name: name.to_string(),
            values: cells.iter().map(|(d, v)| (date(d), *v)).collect(),
        }
    }

    fn seven_columns(rows: Vec<(NaiveDate, Vec<Option<f64>>)>) -> Panel {
        let columns = (1..=7).map(|i| format!("s{i}")).collect();
        Panel::from_rows(columns, rows)
    }

    fn populated(count: usize) -> Vec<Option<f64>> {
        (0..7)
            .map(|i| if i < count { Some(i as f64) } else { None })
            .collect()
    }

    #[test]
    fn test_merge_outer_joins_sorted_periods() {
        let panel = Panel::merge(vec![
            aligned(
                DataSource::Fred,
                "UNRATE",
                &[("2020-02-29", Some(3.5)), ("2020-03-31", Some(4.4))],
            ),
            aligned(
                DataSource::Yahoo,
                "gold",
                &[("2020-01-31", Some(1580.0)), ("2020-02-29", None)],
            ),
        ]);

        assert_eq!(panel.columns(), &["gold".to_string(), "UNRATE".to_string()]);
        assert_eq!(
            panel.periods(),
            &[date("2020-01-31"), date("2020-02-29"), date("2020-03-31")]
        );
        assert_eq!(panel.row(0), Some(&[Some(1580.0), None][..]));
        assert_eq!(panel.value(date("2020-03-31"), "UNRATE"), Some(4.4));
        assert_eq!(panel.value(date("2020-03-31"), "gold"), None);
    }

    #[test]
    fn test_merge_qualifies_colliding_names() {
        let panel = Panel::merge(vec![
            aligned(DataSource::WorldBank, "inflation", &[("2020-01-31", Some(1.2))]),
            aligned(DataSource::Fred, "inflation", &[("2020-01-31", Some(2.3))]),
        ]);

        assert_eq!(
            panel.columns(),
            &["inflation".to_string(), "worldbank:inflation".to_string()]
        );
        assert_eq!(panel.value(date("2020-01-31"), "worldbank:inflation"), Some(1.2));
    }

    #[test]
    fn test_prune_threshold_on_seven_columns() {
        let panel = seven_columns(vec![
            (date("2020-01-31"), populated(3)),
            (date("2020-02-29"), populated(4)),
            (date("2020-03-31"), populated(5)),
            (date("2020-04-30"), populated(7)),
        ]);

        let pruned = panel.prune(DEFAULT_MAX_MISSING_FRACTION).unwrap();

        assert_eq!(pruned.dropped_rows, 2);
        assert_eq!(
            pruned.panel.periods(),
            &[date("2020-03-31"), date("2020-04-30")]
        );
        assert_eq!(pruned.panel.column_count(), 7);
    }

    #[test]
    fn test_prune_keeps_row_exactly_at_threshold() {
        let columns = (1..=5).map(|i| format!("s{i}")).collect();
        let panel = Panel::from_rows(
            columns,
            vec![(date("2020-01-31"), vec![Some(1.0), Some(2.0), Some(3.0)])],
        );

        let pruned = panel.prune(0.4).unwrap();
        assert_eq!(pruned.panel.row_count(), 1);
        assert_eq!(pruned.dropped_columns, vec!["s4".to_string(), "s5".to_string()]);
    }

    #[test]
    fn test_prune_drops_columns_left_empty() {
        let panel = Panel::from_rows(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            vec![
                (date("2019-12-31"), vec![None, None, Some(9.0)]),
                (date("2020-01-31"), vec![Some(1.0), Some(2.0), None]),
            ],
        );

        let pruned = panel.prune(0.5).unwrap();

        assert_eq!(pruned.dropped_rows, 1);
        assert_eq!(pruned.dropped_columns, vec!["c".to_string()]);
        assert_eq!(pruned.panel.columns(), &["a".to_string(), "b".to_string()]);
        assert_eq!(pruned.panel.row(0), Some(&[Some(1.0), Some(2.0)][..]));
    }

    #[test]
    fn test_prune_everything_is_insufficient_data() {
        let panel = seven_columns(vec![
            (date("2020-01-31"), populated(1)),
            (date("2020-02-29"), populated(2)),
        ]);

        match panel.prune(DEFAULT_MAX_MISSING_FRACTION) {
            Err(PipelineError::InsufficientPanelData { rows, columns, .. }) => {
                assert_eq!(rows, 0);
                assert_eq!(columns, 7);
            }
            other => panic!("Expected InsufficientPanelData, got {other:?}"),
        }
    }

    #[test]
    fn test_prune_rejects_invalid_threshold() {
        let panel = seven_columns(vec![(date("2020-01-31"), populated(7))]);

        assert!(matches!(
            panel.prune(1.5),
            Err(PipelineError::InvalidThreshold(_))
        ));
        assert!(matches!(
            panel.prune(f64::NAN),
            Err(PipelineError::InvalidThreshold(_))
        ));
    }

    #[test]
    fn test_prune_empty_panel() {
        let panel = Panel::merge(Vec::new());
        assert!(matches!(
            panel.prune(0.4),
            Err(PipelineError::InsufficientPanelData { columns: 0, .. })
        ));
    }
}
