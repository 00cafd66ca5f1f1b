use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures::future::join_all;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::core::config::YahooSourceConfig;
use crate::core::series::DataSource;
use crate::core::source::{RawExtract, RawPriceRow, SourceFetcher};
use crate::providers::util::{
    DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, http_client, keep_successful, parse_start_timestamp,
    with_retry,
};

/// Daily closes from the Yahoo chart endpoint. Each row carries the asset
/// label from the config rather than the ticker.
pub struct YahooFinanceProvider {
    base_url: String,
    assets: Vec<(String, String)>,
    start_date: String,
    retries: usize,
    delay_ms: u64,
}

impl YahooFinanceProvider {
    pub fn new(base_url: &str, config: &YahooSourceConfig) -> Self {
        YahooFinanceProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            assets: config
                .assets
                .iter()
                .map(|(label, symbol)| (label.clone(), symbol.clone()))
                .collect(),
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
        name = "YahooPriceFetch",
        skip(self, client, period1),
        fields(symbol = %symbol)
    )]
    async fn fetch_symbol(
        &self,
        client: &reqwest::Client,
        label: &str,
        symbol: &str,
        period1: i64,
    ) -> Result<Vec<RawPriceRow>> {
        let url = Url::parse_with_params(
            &format!("{}/v8/finance/chart/{}", self.base_url, symbol),
            &[
                ("interval", "1d".to_string()),
                ("period1", period1.to_string()),
                ("period2", Utc::now().timestamp().to_string()),
            ],
        )?;
        debug!("Requesting price data from {}", url);

        let response = with_retry(
            || async { client.get(url.clone()).send().await?.error_for_status() },
            self.retries,
            self.delay_ms,
        )
        .await
        .with_context(|| format!("Request error for symbol: {symbol}"))?;

        let text = response.text().await?;
        let data: YahooPriceResponse = serde_json::from_str(&text)
            .map_err(|e| anyhow!("Failed to parse JSON response for {}: {}", symbol, e))?;

        let item = data
            .chart
            .result
            .into_iter()
            .flatten()
            .next()
            .ok_or_else(|| anyhow!("No price data found for symbol: {}", symbol))?;

        Ok(extract_closes(label, item))
    }
}

/// Pairs each bar timestamp with its close. Bars are stamped at the
/// exchange's local midnight, so the date is taken after shifting by the
/// chart's `gmtoffset`. Timestamps that do not map to a calendar date are
/// passed through verbatim and rejected downstream.
fn extract_closes(label: &str, item: PriceChartItem) -> Vec<RawPriceRow> {
    let offset = item.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let timestamps = item.timestamp.unwrap_or_default();
    let closes = item
        .indicators
        .and_then(|inds| inds.quote.into_iter().next())
        .and_then(|q| q.close)
        .unwrap_or_default();

    timestamps
        .iter()
        .enumerate()
        .map(|(i, ts)| RawPriceRow {
            symbol: label.to_string(),
            date: ts
                .checked_add(offset)
                .and_then(|local| Utc.timestamp_opt(local, 0).single())
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| ts.to_string()),
            close: closes.get(i).copied().flatten(),
        })
        .collect()
}

#[derive(Deserialize, Debug)]
struct YahooPriceResponse {
    chart: PriceChartResult,
}

#[derive(Deserialize, Debug)]
struct PriceChartResult {
    result: Option<Vec<PriceChartItem>>,
}

#[derive(Deserialize, Debug)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Deserialize, Debug)]
struct Quote {
    close: Option<Vec<Option<f64>>>,
}

#[derive(Deserialize, Debug)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(Deserialize, Debug)]
struct PriceChartItem {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<Indicators>,
}

#[async_trait]
impl SourceFetcher for YahooFinanceProvider {
    fn source(&self) -> DataSource {
        DataSource::Yahoo
    }

    async fn fetch(&self) -> Result<RawExtract> {
        let period1 = parse_start_timestamp(&self.start_date)?;
        let client = http_client()?;

        let results = join_all(self.assets.iter().map(|(label, symbol)| async {
            let rows = self.fetch_symbol(&client, label, symbol, period1).await;
            (label.clone(), rows)
        }))
        .await;

        let rows: Vec<RawPriceRow> = keep_successful(DataSource::Yahoo, results)?
            .into_iter()
            .flatten()
            .collect();
        info!(rows = rows.len(), "Fetched Yahoo Finance prices");
        Ok(RawExtract::Prices(rows))
    }
}
