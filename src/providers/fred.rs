use crate::core::config::FredSourceConfig;
use crate::core::series::DataSource;
use crate::core::source::{RawExtract, RawStatRow, SourceFetcher};
use crate::providers::util::{
    DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, http_client, keep_successful, with_retry,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Official statistics from the St. Louis Fed observations endpoint.
pub struct FredProvider {
    base_url: String,
    api_key: Option<String>,
    series: Vec<String>,
    start_date: String,
    retries: usize,
    delay_ms: u64,
}

#[derive(Deserialize, Debug)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

/// Values arrive as strings; "." marks a missing observation.
#[derive(Deserialize, Debug)]
struct Observation {
    date: String,
    value: String,
}

impl FredProvider {
    pub fn new(base_url: &str, api_key: Option<String>, config: &FredSourceConfig) -> Self {
        FredProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            series: config.series.clone(),
            start_date: config.start_date.clone(),
            retries: DEFAULT_RETRIES,
            delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }

    pub fn with_retry_policy(mut self, retries: usize, delay_ms: u64) -> Self {
        self.retries = retries;
        self.delay_ms = delay_ms;
        self
    }

    #[instrument(
        name = "FredSeriesFetch",
        skip(self, client, api_key),
        fields(series = %series_id)
    )]
    async fn fetch_series(
        &self,
        client: &reqwest::Client,
        api_key: &str,
        series_id: &str,
    ) -> Result<Vec<RawStatRow>> {
        let url = Url::parse_with_params(
            &format!("{}/fred/series/observations", self.base_url),
            &[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("observation_start", self.start_date.as_str()),
            ],
        )?;
        debug!("Requesting observations for {}", series_id);

        let response = with_retry(
            || async { client.get(url.clone()).send().await?.error_for_status() },
            self.retries,
            self.delay_ms,
        )
        .await
        .with_context(|| format!("Failed to fetch FRED series: {series_id}"))?;

        let data = response
            .json::<ObservationsResponse>()
            .await
            .with_context(|| format!("Failed to parse FRED response for {series_id}"))?;

        debug!(rows = data.observations.len(), "Received FRED observations");
        Ok(data
            .observations
            .into_iter()
            .map(|o| RawStatRow {
                indicator: series_id.to_string(),
                date: o.date,
                value: o.value,
            })
            .collect())
    }
}

#[async_trait]
impl SourceFetcher for FredProvider {
    fn source(&self) -> DataSource {
        DataSource::Fred
    }

    async fn fetch(&self) -> Result<RawExtract> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("FRED API key is not configured; set FRED_API_KEY"))?;
        let client = http_client()?;

        let results = join_all(self.series.iter().map(|id| async {
            (id.clone(), self.fetch_series(&client, api_key, id).await)
        }))
        .await;

        let rows: Vec<RawStatRow> = keep_successful(DataSource::Fred, results)?
            .into_iter()
            .flatten()
            .collect();
        info!(rows = rows.len(), "Fetched FRED statistics");
        Ok(RawExtract::Statistics(rows))
    }
}
