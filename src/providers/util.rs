use crate::core::series::DataSource;
use anyhow::{Error, Result, anyhow};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_RETRIES: usize = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .user_agent(concat!("macrolens/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

/// Keeps the series that were fetched and logs the ones that were not.
/// Fails only when there was something to fetch and every request failed.
pub fn keep_successful<T>(source: DataSource, results: Vec<(String, Result<T>)>) -> Result<Vec<T>> {
    let total = results.len();
    let mut fetched = Vec::with_capacity(total);
    let mut last_error = None;

    for (name, result) in results {
        match result {
            Ok(value) => fetched.push(value),
            Err(e) => {
                warn!(%source, series = %name, "Skipping series: {e:#}");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if fetched.is_empty() => {
            Err(e.context(format!("All {total} {source} series failed to download")))
        }
        _ => Ok(fetched),
    }
}

pub fn parse_start_timestamp(start_date: &str) -> Result<i64> {
    chrono::NaiveDate::parse_from_str(start_date, "%Y-%m-%d")
        .map_err(|e| anyhow!("Invalid start date '{start_date}': {e}"))?
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| anyhow!("Invalid start date '{start_date}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_keep_successful_tolerates_partial_failure() {
        let results = vec![
            ("GDP".to_string(), Ok(1)),
            ("BAD".to_string(), Err(anyhow!("boom"))),
        ];
        assert_eq!(keep_successful(DataSource::Fred, results).unwrap(), vec![1]);
    }

    #[test]
    fn test_keep_successful_fails_when_everything_fails() {
        let results: Vec<(String, Result<i32>)> = vec![
            ("A".to_string(), Err(anyhow!("boom"))),
            ("B".to_string(), Err(anyhow!("bang"))),
        ];
        let err = keep_successful(DataSource::Fred, results).unwrap_err();
        assert!(err.to_string().contains("All 2 FRED series failed"));

        let nothing: Vec<(String, Result<i32>)> = vec![];
        assert!(keep_successful(DataSource::Fred, nothing).unwrap().is_empty());
    }

    #[test]
    fn test_parse_start_timestamp() {
        assert_eq!(parse_start_timestamp("2010-01-01").unwrap(), 1_262_304_000);
        assert!(parse_start_timestamp("01/01/2010").is_err());
    }

    #[tokio::test]
    async fn test_with_retry_recovers_after_server_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&mock_server)
            .await;

        let client = http_client().unwrap();
        let calls = AtomicUsize::new(0);
        let response = with_retry(
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                client.get(mock_server.uri()).send().await?.error_for_status()
            },
            2,
            1,
        )
        .await
        .unwrap();

        assert_eq!(response.text().await.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
