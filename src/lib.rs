pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::core::config::AppConfig;
use crate::core::correlation::CorrelationKind;
use crate::core::pipeline::PipelineOptions;
use crate::core::series::DataSource;
use crate::core::source::SourceFetcher;
use crate::store::{DiskStore, RunLock};
use anyhow::{Result, bail};
use std::path::PathBuf;
use tracing::{debug, info};

pub enum AppCommand {
    /// Fetch, normalize and replace the staged tables. Empty means every source.
    Stage { sources: Vec<DataSource> },
    Correlate { max_missing: Option<f64> },
    Run {
        sources: Vec<DataSource>,
        max_missing: Option<f64>,
    },
    ShowMatrix { kind: CorrelationKind },
    ShowSeries {
        source: DataSource,
        name: Option<String>,
    },
    Inspect,
    Forecast {
        source: DataSource,
        name: String,
        months: usize,
    },
    Export { dir: PathBuf },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("macrolens starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    let data_dir = config.default_data_path()?;
    debug!("Using data directory {}", data_dir.display());

    match command {
        AppCommand::Stage { sources } => {
            let _lock = RunLock::acquire(&data_dir)?;
            let store = DiskStore::open(&config.store_path()?)?;
            stage(&store, &config, &sources).await
        }
        AppCommand::Correlate { max_missing } => {
            let _lock = RunLock::acquire(&data_dir)?;
            let store = DiskStore::open(&config.store_path()?)?;
            cli::correlate::run(&store, &pipeline_options(&config, max_missing))?;
            Ok(())
        }
        AppCommand::Run {
            sources,
            max_missing,
        } => {
            let _lock = RunLock::acquire(&data_dir)?;
            let store = DiskStore::open(&config.store_path()?)?;
            stage(&store, &config, &sources).await?;
            cli::correlate::run(&store, &pipeline_options(&config, max_missing))?;
            Ok(())
        }
        AppCommand::ShowMatrix { kind } => {
            let store = DiskStore::open(&config.store_path()?)?;
            cli::show::show_matrix(&store, kind)
        }
        AppCommand::ShowSeries { source, name } => {
            let store = DiskStore::open(&config.store_path()?)?;
            cli::show::show_series(&store, source, name.as_deref())
        }
        AppCommand::Inspect => {
            let store = DiskStore::open(&config.store_path()?)?;
            cli::inspect::run(&store)
        }
        AppCommand::Forecast {
            source,
            name,
            months,
        } => {
            let store = DiskStore::open(&config.store_path()?)?;
            cli::forecast::run(&store, source, &name, months)
        }
        AppCommand::Export { dir } => {
            let store = DiskStore::open(&config.store_path()?)?;
            cli::export::run(&store, &dir)
        }
    }
}

fn pipeline_options(config: &AppConfig, max_missing: Option<f64>) -> PipelineOptions {
    PipelineOptions {
        max_missing_fraction: max_missing.unwrap_or(config.pipeline.max_missing_fraction),
    }
}

async fn stage(store: &DiskStore, config: &AppConfig, sources: &[DataSource]) -> Result<()> {
    let selected: Vec<DataSource> = if sources.is_empty() {
        DataSource::ALL.to_vec()
    } else {
        sources.to_vec()
    };
    let fetchers: Vec<Box<dyn SourceFetcher>> = selected
        .iter()
        .map(|source| providers::fetcher_for(*source, config))
        .collect();

    let outcomes = cli::stage::stage_sources(store, &fetchers).await?;
    cli::stage::print_report(&outcomes);

    if outcomes
        .iter()
        .all(|o| matches!(o.status, cli::stage::StageStatus::Failed(_)))
    {
        bail!("Every selected source failed to download");
    }
    Ok(())
}
