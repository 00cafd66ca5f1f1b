//! Long-format series tables shared by every source.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// How a source's native frequency is mapped onto month-end periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Last observation on or before each month-end, within the period only.
    Last,
    /// Step function: the last known value holds until a newer one arrives.
    ForwardFill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum DataSource {
    Yahoo,
    Fred,
    WorldBank,
}

impl DataSource {
    /// Every source, in panel column order.
    pub const ALL: [DataSource; 3] = [DataSource::Yahoo, DataSource::Fred, DataSource::WorldBank];

    pub fn slug(&self) -> &'static str {
        match self {
            DataSource::Yahoo => "yahoo",
            DataSource::Fred => "fred",
            DataSource::WorldBank => "worldbank",
        }
    }

    pub fn fill_policy(&self) -> FillPolicy {
        match self {
            DataSource::Yahoo | DataSource::Fred => FillPolicy::Last,
            DataSource::WorldBank => FillPolicy::ForwardFill,
        }
    }
}

impl Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                DataSource::Yahoo => "Yahoo Finance",
                DataSource::Fred => "FRED",
                DataSource::WorldBank => "World Bank",
            }
        )
    }
}

impl FromStr for DataSource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "yahoo" => Ok(DataSource::Yahoo),
            "fred" => Ok(DataSource::Fred),
            "worldbank" | "world_bank" | "wb" => Ok(DataSource::WorldBank),
            _ => Err(anyhow::anyhow!("Invalid data source: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub date: NaiveDate,
    pub name: String,
    pub value: f64,
}

/// All observations staged for one source.
///
/// Rows are sorted by `(name, date)` and each pair appears once; the
/// constructor enforces both, keeping the last row of a duplicated pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SeriesTableRecord")]
pub struct SeriesTable {
    pub source: DataSource,
    observations: Vec<RawObservation>,
}

/// Wire shape of a table; deserializing goes through [`SeriesTable::new`].
#[derive(Deserialize)]
struct SeriesTableRecord {
    source: DataSource,
    observations: Vec<RawObservation>,
}

impl From<SeriesTableRecord> for SeriesTable {
    fn from(record: SeriesTableRecord) -> Self {
        SeriesTable::new(record.source, record.observations)
    }
}

impl SeriesTable {
    pub fn new(source: DataSource, mut observations: Vec<RawObservation>) -> Self {
        // Stable sort keeps input order within a pair, so the last duplicate wins below.
        observations.sort_by(|a, b| a.name.cmp(&b.name).then(a.date.cmp(&b.date)));

        let mut deduped: Vec<RawObservation> = Vec::with_capacity(observations.len());
        for obs in observations {
            match deduped.last_mut() {
                Some(prev) if prev.name == obs.name && prev.date == obs.date => *prev = obs,
                _ => deduped.push(obs),
            }
        }

        Self {
            source,
            observations: deduped,
        }
    }

    pub fn empty(source: DataSource) -> Self {
        Self {
            source,
            observations: Vec::new(),
        }
    }

    pub fn observations(&self) -> &[RawObservation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Date-ordered points per series name.
    pub fn by_name(&self) -> BTreeMap<&str, Vec<(NaiveDate, f64)>> {
        let mut grouped: BTreeMap<&str, Vec<(NaiveDate, f64)>> = BTreeMap::new();
        for obs in &self.observations {
            grouped
                .entry(obs.name.as_str())
                .or_default()
                .push((obs.date, obs.value));
        }
        grouped
    }

    pub fn series(&self, name: &str) -> Vec<(NaiveDate, f64)> {
        self.observations
            .iter()
            .filter(|obs| obs.name == name)
            .map(|obs| (obs.date, obs.value))
            .collect()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.iter().map(|obs| obs.date).max()
    }

    pub fn summary(&self) -> TableSummary {
        TableSummary {
            source: self.source,
            rows: self.observations.len(),
            series: self.by_name().len(),
            first_date: self.observations.iter().map(|obs| obs.date).min(),
            last_date: self.last_date(),
        }
    }
}

/// Row count and date coverage of a staged table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub source: DataSource,
    pub rows: usize,
    pub series: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}
