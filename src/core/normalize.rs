//! Converts each source's raw extract into the shared `(date, name, value)` shape.
//!
//! There is exactly one entry point, [`normalize`], and it dispatches on the
//! extract kind. Rows that fail to parse are dropped and counted in the
//! returned [`NormalizeReport`]; they never reach the aligner as placeholders.
use crate::core::error::MalformedRecord;
use crate::core::series::{DataSource, RawObservation, SeriesTable};
use crate::core::source::{RawExtract, RawIndicatorTable, RawPriceRow, RawStatRow};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Per-source accounting of what normalization kept and dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub bad_dates: usize,
    pub bad_values: usize,
    /// Cells the upstream marked as absent (null or `.`); not errors.
    pub missing: usize,
    pub duplicates: usize,
}

impl NormalizeReport {
    /// Malformed rows, the count surfaced to the operator.
    pub fn dropped(&self) -> usize {
        self.bad_dates + self.bad_values
    }
}

pub fn normalize(extract: RawExtract) -> (SeriesTable, NormalizeReport) {
    let source = extract.source();
    let mut collector = Collector::new(source);

    match extract {
        RawExtract::Prices(rows) => normalize_prices(&mut collector, rows),
        RawExtract::Statistics(rows) => normalize_statistics(&mut collector, rows),
        RawExtract::Indicators(table) => normalize_indicators(&mut collector, table),
    }

    collector.finish()
}

fn normalize_prices(collector: &mut Collector, rows: Vec<RawPriceRow>) {
    for row in rows {
        let value = match row.close {
            None => Ok(None),
            Some(close) if close.is_finite() => Ok(Some(close)),
            Some(close) => Err(MalformedRecord::Value(close.to_string())),
        };
        collector.push(&row.date, row.symbol, value);
    }
}

fn normalize_statistics(collector: &mut Collector, rows: Vec<RawStatRow>) {
    for row in rows {
        let value = parse_value(&row.value);
        collector.push(&row.date, row.indicator, value);
    }
}

fn normalize_indicators(collector: &mut Collector, table: RawIndicatorTable) {
    for row in table.rows {
        for (column, cell) in table.columns.iter().zip(row.cells) {
            let value = match cell {
                None => Ok(None),
                Some(v) if v.is_finite() => Ok(Some(v)),
                Some(v) => Err(MalformedRecord::Value(v.to_string())),
            };
            collector.push(&row.date, column.clone(), value);
        }
    }
}

/// Accepts `YYYY-MM-DD`, `YYYY-MM` (first of month) and `YYYY` (January 1st).
pub fn parse_date(raw: &str) -> Result<NaiveDate, MalformedRecord> {
    let s = raw.trim();
    let parsed = match s.len() {
        4 => s
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1)),
        7 => NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").ok(),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").ok(),
    };
    parsed.ok_or_else(|| MalformedRecord::Date(raw.to_string()))
}

/// `Ok(None)` for an explicit absence marker, `Err` for anything non-numeric.
pub fn parse_value(raw: &str) -> Result<Option<f64>, MalformedRecord> {
    let s = raw.trim();
    if s.is_empty() || s == "." {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(MalformedRecord::Value(raw.to_string())),
    }
}

struct Collector {
    source: DataSource,
    rows: Vec<RawObservation>,
    report: NormalizeReport,
}

impl Collector {
    fn new(source: DataSource) -> Self {
        Self {
            source,
            rows: Vec::new(),
            report: NormalizeReport::default(),
        }
    }

    fn push(&mut self, date: &str, name: String, value: Result<Option<f64>, MalformedRecord>) {
        let date = match parse_date(date) {
            Ok(date) => date,
            Err(e) => {
                debug!(source = %self.source, series = %name, "Dropping row: {e}");
                self.report.bad_dates += 1;
                return;
            }
        };

        match value {
            Ok(Some(value)) => self.rows.push(RawObservation { date, name, value }),
            Ok(None) => self.report.missing += 1,
            Err(e) => {
                debug!(source = %self.source, series = %name, %date, "Dropping row: {e}");
                self.report.bad_values += 1;
            }
        }
    }

    fn finish(mut self) -> (SeriesTable, NormalizeReport) {
        let candidates = self.rows.len();
        let table = SeriesTable::new(self.source, self.rows);
        self.report.duplicates = candidates - table.len();
        self.report.accepted = table.len();

        if self.report.dropped() > 0 {
            warn!(
                source = %self.source,
                dropped = self.report.dropped(),
                bad_dates = self.report.bad_dates,
                bad_values = self.report.bad_values,
                "Dropped malformed records"
            );
        }
        info!(
            source = %self.source,
            accepted = self.report.accepted,
            missing = self.report.missing,
            duplicates = self.report.duplicates,
            "Normalized extract"
        );

        (table, self.report)
    }
}
