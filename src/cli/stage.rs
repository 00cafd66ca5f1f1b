use super::ui;
use crate::core::normalize::{NormalizeReport, normalize};
use crate::core::series::DataSource;
use crate::core::source::SourceFetcher;
use crate::core::store::SeriesStore;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum StageStatus {
    Staged {
        report: NormalizeReport,
        series: usize,
    },
    /// Nothing usable came back; the previously staged table was kept.
    Empty(NormalizeReport),
    Failed(String),
}

#[derive(Debug)]
pub struct StageOutcome {
    pub source: DataSource,
    pub status: StageStatus,
}

impl StageOutcome {
    pub fn is_staged(&self) -> bool {
        matches!(self.status, StageStatus::Staged { .. })
    }
}

/// Fetches every source concurrently, then normalizes and replaces each
/// staged table in turn. A source that fails or comes back empty does not
/// affect the others; a store failure aborts the stage.
pub async fn stage_sources(
    store: &dyn SeriesStore,
    fetchers: &[Box<dyn SourceFetcher>],
) -> Result<Vec<StageOutcome>> {
    let pb = ui::new_progress_bar(fetchers.len() as u64, true);
    pb.set_message("Fetching");
    let fetch_futures = fetchers.iter().map(|fetcher| {
        let pb_clone = pb.clone();
        async move {
            let res = fetcher.fetch().await;
            pb_clone.inc(1);
            (fetcher.source(), res)
        }
    });
    let extracts = join_all(fetch_futures).await;
    pb.finish_and_clear();

    let mut outcomes = Vec::with_capacity(extracts.len());
    for (source, extract) in extracts {
        let status = match extract {
            Err(e) => {
                error!(%source, "Fetch failed: {e:#}");
                StageStatus::Failed(format!("{e:#}"))
            }
            Ok(extract) => {
                let (table, report) = normalize(extract);
                if table.is_empty() {
                    warn!(
                        %source,
                        "Extract has no usable rows; keeping the previously staged table"
                    );
                    StageStatus::Empty(report)
                } else {
                    store.replace_series(&table)?;
                    let series = table.by_name().len();
                    info!(%source, rows = table.len(), series, "Staged source");
                    StageStatus::Staged { report, series }
                }
            }
        };
        outcomes.push(StageOutcome { source, status });
    }

    Ok(outcomes)
}

pub fn print_report(outcomes: &[StageOutcome]) {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Source"),
        ui::header_cell("Status"),
        ui::header_cell("Series"),
        ui::header_cell("Rows"),
        ui::header_cell("Missing"),
        ui::header_cell("Dropped"),
        ui::header_cell("Duplicates"),
    ]);

    for outcome in outcomes {
        let mut row = vec![Cell::new(outcome.source.to_string())];
        match &outcome.status {
            StageStatus::Staged { report, series } => {
                row.push(Cell::new("staged"));
                row.push(Cell::new(series));
                row.extend(report_cells(report));
            }
            StageStatus::Empty(report) => {
                row.push(Cell::new(ui::style_text(
                    "empty, kept previous",
                    ui::StyleType::Warning,
                )));
                row.push(ui::na_cell(false));
                row.extend(report_cells(report));
            }
            StageStatus::Failed(reason) => {
                row.push(Cell::new(ui::style_text(reason, ui::StyleType::Error)));
                row.extend((0..5).map(|_| ui::na_cell(true)));
            }
        }
        table.add_row(row);
    }

    println!("{table}");
}

fn report_cells(report: &NormalizeReport) -> Vec<Cell> {
    vec![
        Cell::new(report.accepted),
        Cell::new(report.missing),
        Cell::new(report.dropped()),
        Cell::new(report.duplicates),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::series::{RawObservation, SeriesTable};
    use crate::core::source::{RawExtract, RawStatRow};
    use crate::store::memory::MemoryStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FixedFetcher {
        source: DataSource,
        extract: Option<RawExtract>,
    }

    #[async_trait]
    impl SourceFetcher for FixedFetcher {
        fn source(&self) -> DataSource {
            self.source
        }

        async fn fetch(&self) -> Result<RawExtract> {
            self.extract
                .clone()
                .ok_or_else(|| anyhow::anyhow!("upstream unavailable"))
        }
    }

    fn stat(date: &str, value: &str) -> RawStatRow {
        RawStatRow {
            indicator: "UNRATE".to_string(),
            date: date.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_stage_replaces_and_reports() {
        let store = MemoryStore::new();
        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![
            Box::new(FixedFetcher {
                source: DataSource::Fred,
                extract: Some(RawExtract::Statistics(vec![
                    stat("2020-01-01", "3.5"),
                    stat("2020-02-01", "."),
                    stat("garbage", "3.6"),
                ])),
            }),
            Box::new(FixedFetcher {
                source: DataSource::Yahoo,
                extract: None,
            }),
        ];

        let outcomes = stage_sources(&store, &fetchers).await.unwrap();

        assert_eq!(outcomes.len(), 2);
        match &outcomes[0].status {
            StageStatus::Staged { report, series } => {
                assert_eq!(*series, 1);
                assert_eq!(report.accepted, 1);
                assert_eq!(report.missing, 1);
                assert_eq!(report.dropped(), 1);
            }
            other => panic!("unexpected status {other:?}"),
        }
        assert!(matches!(outcomes[1].status, StageStatus::Failed(_)));
        assert_eq!(store.load_series(DataSource::Fred).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_extract_keeps_previous_table() {
        let store = MemoryStore::new();
        let previous = SeriesTable::new(
            DataSource::Fred,
            vec![RawObservation {
                date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap(),
                name: "UNRATE".to_string(),
                value: 4.0,
            }],
        );
        store.replace_series(&previous).unwrap();

        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![Box::new(FixedFetcher {
            source: DataSource::Fred,
            extract: Some(RawExtract::Statistics(vec![stat("2020-01-01", ".")])),
        })];
        let outcomes = stage_sources(&store, &fetchers).await.unwrap();

        assert!(matches!(outcomes[0].status, StageStatus::Empty(_)));
        assert!(!outcomes[0].is_staged());
        assert_eq!(store.load_series(DataSource::Fred).unwrap(), previous);
    }

    #[tokio::test]
    async fn test_store_failure_aborts() {
        let store = MemoryStore::offline();
        let fetchers: Vec<Box<dyn SourceFetcher>> = vec![Box::new(FixedFetcher {
            source: DataSource::Fred,
            extract: Some(RawExtract::Statistics(vec![stat("2020-01-01", "1.0")])),
        })];
        assert!(stage_sources(&store, &fetchers).await.is_err());
    }
}
