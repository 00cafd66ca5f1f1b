use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use macrolens::core::correlation::CorrelationKind;
use macrolens::core::log::init_logging;
use macrolens::core::series::DataSource;
use std::path::PathBuf;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceArg {
    Yahoo,
    Fred,
    Worldbank,
}

impl From<SourceArg> for DataSource {
    fn from(arg: SourceArg) -> DataSource {
        match arg {
            SourceArg::Yahoo => DataSource::Yahoo,
            SourceArg::Fred => DataSource::Fred,
            SourceArg::Worldbank => DataSource::WorldBank,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Pearson,
    Spearman,
}

impl From<KindArg> for CorrelationKind {
    fn from(arg: KindArg) -> CorrelationKind {
        match arg {
            KindArg::Pearson => CorrelationKind::Pearson,
            KindArg::Spearman => CorrelationKind::Spearman,
        }
    }
}

#[derive(Subcommand)]
enum ShowCommands {
    /// Display a stored correlation matrix
    Matrix {
        #[arg(short, long, value_enum, default_value = "pearson")]
        kind: KindArg,
    },
    /// List staged series for a source, or print one of them
    Series {
        #[arg(short, long, value_enum)]
        source: SourceArg,
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Download and stage source tables
    Stage {
        /// Sources to refresh; all of them when omitted
        #[arg(short, long, value_enum)]
        source: Vec<SourceArg>,
    },
    /// Rebuild the panel and correlation matrices from staged tables
    Correlate {
        /// Drop months missing more than this fraction of columns
        #[arg(short, long)]
        max_missing: Option<f64>,
    },
    /// Stage then correlate
    Run {
        #[arg(short, long, value_enum)]
        source: Vec<SourceArg>,
        #[arg(short, long)]
        max_missing: Option<f64>,
    },
    /// Display stored results
    #[command(subcommand)]
    Show(ShowCommands),
    /// Summarize what is staged
    Inspect,
    /// Project a staged series forward along its linear trend
    Forecast {
        #[arg(short, long, value_enum)]
        source: SourceArg,
        #[arg(short, long)]
        name: String,
        #[arg(short, long, default_value_t = 12)]
        months: usize,
    },
    /// Write staged tables, the panel and matrices as CSV
    Export {
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

impl From<Commands> for macrolens::AppCommand {
    fn from(cmd: Commands) -> macrolens::AppCommand {
        let sources = |args: Vec<SourceArg>| -> Vec<DataSource> {
            args.into_iter().map(DataSource::from).collect()
        };
        match cmd {
            Commands::Stage { source } => macrolens::AppCommand::Stage {
                sources: sources(source),
            },
            Commands::Correlate { max_missing } => macrolens::AppCommand::Correlate { max_missing },
            Commands::Run {
                source,
                max_missing,
            } => macrolens::AppCommand::Run {
                sources: sources(source),
                max_missing,
            },
            Commands::Show(ShowCommands::Matrix { kind }) => {
                macrolens::AppCommand::ShowMatrix { kind: kind.into() }
            }
            Commands::Show(ShowCommands::Series { source, name }) => {
                macrolens::AppCommand::ShowSeries {
                    source: source.into(),
                    name,
                }
            }
            Commands::Inspect => macrolens::AppCommand::Inspect,
            Commands::Forecast {
                source,
                name,
                months,
            } => macrolens::AppCommand::Forecast {
                source: source.into(),
                name,
                months,
            },
            Commands::Export { dir } => macrolens::AppCommand::Export { dir },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {e}");
    }

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => macrolens::cli::setup::setup_at_path(path),
            None => macrolens::cli::setup::setup(),
        },
        Some(cmd) => macrolens::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
