//! Upstream fetch abstractions and the raw shapes they produce

use crate::core::series::DataSource;
use anyhow::Result;
use async_trait::async_trait;

/// One daily bar from a market-data provider.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPriceRow {
    pub symbol: String,
    pub date: String,
    pub close: Option<f64>,
}

/// One observation of an official statistic, value still in wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStatRow {
    pub indicator: String,
    pub date: String,
    pub value: String,
}

/// Wide development-indicator table: one row per period, one column per indicator.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawIndicatorTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawIndicatorRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawIndicatorRow {
    pub date: String,
    pub cells: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawExtract {
    Prices(Vec<RawPriceRow>),
    Statistics(Vec<RawStatRow>),
    Indicators(RawIndicatorTable),
}

impl RawExtract {
    pub fn source(&self) -> DataSource {
        match self {
            RawExtract::Prices(_) => DataSource::Yahoo,
            RawExtract::Statistics(_) => DataSource::Fred,
            RawExtract::Indicators(_) => DataSource::WorldBank,
        }
    }
}

#[async_trait]
pub trait SourceFetcher: Send + Sync {
    fn source(&self) -> DataSource;

    async fn fetch(&self) -> Result<RawExtract>;
}
