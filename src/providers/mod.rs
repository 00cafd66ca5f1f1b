pub mod fred;
pub mod util;
pub mod world_bank;
pub mod yahoo_finance;

use crate::core::config::AppConfig;
use crate::core::series::DataSource;
use crate::core::source::SourceFetcher;

pub use fred::FredProvider;
pub use world_bank::WorldBankProvider;
pub use yahoo_finance::YahooFinanceProvider;

/// Builds the fetcher for `source` from the configured catalog and endpoints.
pub fn fetcher_for(source: DataSource, config: &AppConfig) -> Box<dyn SourceFetcher> {
    let providers = &config.providers;
    let sources = &config.sources;
    match source {
        DataSource::Yahoo => Box::new(YahooFinanceProvider::new(
            providers.yahoo_url(),
            &sources.yahoo,
        )),
        DataSource::Fred => Box::new(FredProvider::new(
            providers.fred_url(),
            config.fred_api_key(),
            &sources.fred,
        )),
        DataSource::WorldBank => Box::new(WorldBankProvider::new(
            providers.world_bank_url(),
            &sources.world_bank,
        )),
    }
}
