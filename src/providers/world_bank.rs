use crate::core::config::WorldBankSourceConfig;
use crate::core::series::DataSource;
use crate::core::source::{RawExtract, RawIndicatorRow, RawIndicatorTable, SourceFetcher};
use crate::providers::util::{
    DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, http_client, keep_successful, with_retry,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Url;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

const PER_PAGE: usize = 1000;

/// Annual development indicators for one country, pivoted into a wide table
/// with one column per indicator.
pub struct WorldBankProvider {
    base_url: String,
    country: String,
    start_year: i32,
    end_year: i32,
    indicators: Vec<(String, String)>,
    retries: usize,
    delay_ms: u64,
}

/// The API answers with a two element array: paging metadata, then the rows.
/// The rows element is `null` when nothing matched.
#[derive(Deserialize, Debug)]
struct IndicatorPage(PageMeta, Option<Vec<IndicatorEntry>>);

#[derive(Deserialize, Debug)]
struct PageMeta {
    page: usize,
    pages: usize,
}

#[derive(Deserialize, Debug)]
struct IndicatorEntry {
    date: String,
    value: Option<f64>,
}

impl WorldBankProvider {
    pub fn new(base_url: &str, config: &WorldBankSourceConfig) -> Self {
        WorldBankProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            country: config.country.clone(),
            start_year: config.start_year,
            end_year: config.end_year,
            indicators: config
                .indicators
                .iter()
                .map(|(name, code)| (name.clone(), code.clone()))
                .collect(),
            retries: DEFAULT_RETRIES,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }

    pub fn with_retry_policy(mut self, retries: usize, delay_ms: u64) -> Self {
        self.retries = retries;
        self.delay_ms = delay_ms;
        self
    }

    async fn fetch_page(
        &self,
        client: &reqwest::Client,
        code: &str,
        page: usize,
    ) -> Result<IndicatorPage> {
        let url = Url::parse_with_params(
            &format!(
                "{}/v2/country/{}/indicator/{}",
                self.base_url, self.country, code
            ),
            &[
                ("format", "json".to_string()),
                ("date", format!("{}:{}", self.start_year, self.end_year)),
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ],
        )?;
        debug!("Requesting indicator page from {}", url);

        let response = with_retry(
            || async { client.get(url.clone()).send().await?.error_for_status() },
            self.retries,
            self.delay_ms,
        )
        .await
        .with_context(|| format!("Failed to fetch World Bank indicator: {code}"))?;

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| anyhow!("Unexpected World Bank response for {}: {}", code, e))
    }

    #[instrument(
        name = "WorldBankIndicatorFetch",
        skip(self, client),
        fields(country = %self.country)
    )]
    async fn fetch_indicator(
        &self,
        client: &reqwest::Client,
        code: &str,
    ) -> Result<Vec<IndicatorEntry>> {
        let mut entries = Vec::new();
        let mut page = 1;
        loop {
            let IndicatorPage(meta, rows) = self.fetch_page(client, code, page).await?;
            entries.extend(rows.unwrap_or_default());
            if meta.page >= meta.pages {
                break;
            }
            page = meta.page + 1;
        }
        debug!(rows = entries.len(), "Received indicator rows");
        Ok(entries)
    }
}

/// Pivots per-indicator rows into one row per year. Rows are ordered by date
/// and cells follow `columns`.
fn pivot(columns: Vec<String>, series: Vec<Vec<IndicatorEntry>>) -> RawIndicatorTable {
    let width = columns.len();
    let mut by_date: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
    for (col, entries) in series.into_iter().enumerate() {
        for entry in entries {
            by_date
                .entry(entry.date)
                .or_insert_with(|| vec![None; width])[col] = entry.value;
        }
    }

    RawIndicatorTable {
        columns,
        rows: by_date
            .into_iter()
            .map(|(date, cells)| RawIndicatorRow { date, cells })
            .collect(),
    }
}

#[async_trait]
impl SourceFetcher for WorldBankProvider {
    fn source(&self) -> DataSource {
        DataSource::WorldBank
    }

    async fn fetch(&self) -> Result<RawExtract> {
        let client = http_client()?;

        let results = join_all(self.indicators.iter().map(|(name, code)| async {
            let entries = self
                .fetch_indicator(&client, code)
                .await
                .map(|entries| (name.clone(), entries));
            (name.clone(), entries)
        }))
        .await;

        let (columns, series): (Vec<String>, Vec<Vec<IndicatorEntry>>) =
            keep_successful(DataSource::WorldBank, results)?
                .into_iter()
                .unzip();
        let table = pivot(columns, series);
        info!(
            indicators = table.columns.len(),
            years = table.rows.len(),
            "Fetched World Bank indicators"
        );
        Ok(RawExtract::Indicators(table))
    }
}
