use crate::core::panel::DEFAULT_MAX_MISSING_FRACTION;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const FRED_API_KEY_ENV: &str = "FRED_API_KEY";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FredSourceConfig {
    pub api_key: Option<String>,
    pub series: Vec<String>,
    #[serde(default = "default_start_date")]
    pub start_date: String,
}

impl Default for FredSourceConfig {
    fn default() -> Self {
        FredSourceConfig {
            api_key: None,
            series: ["CPIAUCNS", "GDP", "UNRATE", "USSLIND"]
                .into_iter()
                .map(String::from)
                .collect(),
            start_date: default_start_date(),
        }
    }
}

/// Market series keyed by the label they are stored under.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooSourceConfig {
    pub assets: BTreeMap<String, String>,
    #[serde(default = "default_start_date")]
    pub start_date: String,
}

impl Default for YahooSourceConfig {
    fn default() -> Self {
        YahooSourceConfig {
            assets: [
                ("sp500", "^GSPC"),
                ("bond10y", "^TNX"),
                ("gold", "GC=F"),
                ("oil", "CL=F"),
                ("eurusd", "EURUSD=X"),
                ("reit_etf", "VNQ"),
            ]
            .into_iter()
            .map(|(label, symbol)| (label.to_string(), symbol.to_string()))
            .collect(),
            start_date: default_start_date(),
        }
    }
}

/// Development indicators keyed by friendly name, valued by indicator code.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WorldBankSourceConfig {
    pub country: String,
    pub start_year: i32,
    pub end_year: i32,
    pub indicators: BTreeMap<String, String>,
}

impl Default for WorldBankSourceConfig {
    fn default() -> Self {
        WorldBankSourceConfig {
            country: "US".to_string(),
            start_year: 2010,
            end_year: 2024,
            indicators: [
                ("gdp_per_capita", "NY.GDP.PCAP.CD"),
                ("inflation", "FP.CPI.TOTL.ZG"),
                ("population", "SP.POP.TOTL"),
                ("gov_exp_pct_gdp", "NE.CON.GOVT.ZS"),
                ("unemployment_global", "SL.UEM.TOTL.ZS"),
            ]
            .into_iter()
            .map(|(name, code)| (name.to_string(), code.to_string()))
            .collect(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SourcesConfig {
    #[serde(default)]
    pub fred: FredSourceConfig,
    #[serde(default)]
    pub yahoo: YahooSourceConfig,
    #[serde(default)]
    pub world_bank: WorldBankSourceConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
}

impl ProviderConfig {
    fn new(base_url: &str) -> Self {
        ProviderConfig {
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub fred: Option<ProviderConfig>,
    pub yahoo: Option<ProviderConfig>,
    pub world_bank: Option<ProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            fred: Some(ProviderConfig::new(DEFAULT_FRED_URL)),
            yahoo: Some(ProviderConfig::new(DEFAULT_YAHOO_URL)),
            world_bank: Some(ProviderConfig::new(DEFAULT_WORLD_BANK_URL)),
        }
    }
}

pub const DEFAULT_FRED_URL: &str = "https://api.stlouisfed.org";
pub const DEFAULT_YAHOO_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_WORLD_BANK_URL: &str = "https://api.worldbank.org";

impl ProvidersConfig {
    pub fn fred_url(&self) -> &str {
        self.fred.as_ref().map_or(DEFAULT_FRED_URL, |p| &p.base_url)
    }

    pub fn yahoo_url(&self) -> &str {
        self.yahoo.as_ref().map_or(DEFAULT_YAHOO_URL, |p| &p.base_url)
    }

    pub fn world_bank_url(&self) -> &str {
        self.world_bank
            .as_ref()
            .map_or(DEFAULT_WORLD_BANK_URL, |p| &p.base_url)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Rows missing more than this fraction of columns are pruned.
    pub max_missing_fraction: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            max_missing_fraction: DEFAULT_MAX_MISSING_FRACTION,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    pub data_path: Option<String>,
}

fn default_start_date() -> String {
    "2010-01-01".to_string()
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("org", "macrolens", "macrolens")
        .context("Could not determine project directories")
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(project_dirs()?.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        Ok(project_dirs()?.data_dir().to_path_buf())
    }

    /// Directory holding the fjall keyspace.
    pub fn store_path(&self) -> Result<PathBuf> {
        Ok(self.default_data_path()?.join("store"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// The FRED key, with the environment taking precedence over the file.
    pub fn fred_api_key(&self) -> Option<String> {
        std::env::var(FRED_API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.sources.fred.api_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
sources:
  fred:
    api_key: "abc123"
    series: ["GDP", "UNRATE"]
  yahoo:
    assets:
      sp500: "^GSPC"
    start_date: "2015-01-01"
  world_bank:
    country: "DE"
    start_year: 2012
    end_year: 2020
    indicators:
      inflation: "FP.CPI.TOTL.ZG"
pipeline:
  max_missing_fraction: 0.25
data_path: "/tmp/macrolens"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.sources.fred.series, vec!["GDP", "UNRATE"]);
        assert_eq!(config.sources.fred.api_key.as_deref(), Some("abc123"));
        assert_eq!(config.sources.fred.start_date, "2010-01-01");
        assert_eq!(config.sources.yahoo.assets.get("sp500").unwrap(), "^GSPC");
        assert_eq!(config.sources.yahoo.start_date, "2015-01-01");
        assert_eq!(config.sources.world_bank.country, "DE");
        assert_eq!(config.sources.world_bank.indicators.len(), 1);
        assert_eq!(config.pipeline.max_missing_fraction, 0.25);
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/tmp/macrolens")
        );
        assert_eq!(
            config.store_path().unwrap(),
            PathBuf::from("/tmp/macrolens/store")
        );

        assert_eq!(
            config.providers.yahoo_url(),
            "https://query1.finance.yahoo.com"
        );
        assert_eq!(config.providers.fred_url(), "https://api.stlouisfed.org");
    }

    #[test]
    fn test_empty_config_uses_default_catalog() {
        let config: AppConfig = serde_yaml::from_str("data_path: ~").unwrap();

        assert_eq!(config.sources.fred.series.len(), 4);
        assert_eq!(config.sources.yahoo.assets.len(), 6);
        assert_eq!(config.sources.yahoo.assets.get("gold").unwrap(), "GC=F");
        assert_eq!(config.sources.world_bank.start_year, 2010);
        assert_eq!(config.sources.world_bank.end_year, 2024);
        assert_eq!(
            config.sources.world_bank.indicators.get("population").unwrap(),
            "SP.POP.TOTL"
        );
        assert_eq!(
            config.pipeline.max_missing_fraction,
            DEFAULT_MAX_MISSING_FRACTION
        );
    }

    #[test]
    fn test_provider_overrides() {
        let yaml_str = r#"
providers:
  fred:
    base_url: "http://localhost:1234"
  yahoo: ~
  world_bank:
    base_url: "http://localhost:5678"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml_str).unwrap();
        assert_eq!(config.providers.fred_url(), "http://localhost:1234");
        assert_eq!(config.providers.yahoo_url(), DEFAULT_YAHOO_URL);
        assert_eq!(config.providers.world_bank_url(), "http://localhost:5678");
    }
}
