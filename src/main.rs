//! # Run the full pipeline and backtest
//! churn-backtest run --config config/default.toml
//!
//! # Rebuild the dataset, ignoring any parquet cache
//! churn-backtest run --config config/default.toml --rebuild

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use churn_backtest::backtest::{BacktestEngine, Window};
use churn_backtest::config::PipelineConfig;
use churn_backtest::dataset;
use churn_backtest::model::LogisticModel;

#[derive(Parser)]
#[command(name = "churn-backtest")]
#[command(about = "Customer churn feature pipeline and walk-forward backtest")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the dataset, backtest the classifier, and write live predictions
    Run {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Rebuild the dataset even when a cache exists
        #[arg(long)]
        rebuild: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config, rebuild } => run(config, rebuild),
    }
}

fn run(config_path: Option<PathBuf>, rebuild: bool) -> anyhow::Result<()> {
    let config = match &config_path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate()?;

    let (train, test) = load_or_build(&config, rebuild)?;
    info!(train = train.len(), test = test.len(), "dataset ready");

    let window = Window::from_config(config.window)?;
    let engine = BacktestEngine::new(window);
    let mut model = LogisticModel::default();

    let (metrics, predictions) = engine.run(&mut model, &train, &test)?;
    println!("{}", metrics.summary());

    dataset::write_predictions(&config.output_path, &predictions)
        .with_context(|| format!("writing predictions to {}", config.output_path.display()))?;
    info!(path = %config.output_path.display(), clients = predictions.len(), "wrote live predictions");

    if config.log_results {
        dataset::append_result_log(&config.log_path, &metrics)?;
    }
    Ok(())
}

fn load_or_build(
    config: &PipelineConfig,
    rebuild: bool,
) -> anyhow::Result<(Vec<dataset::TrainingRow>, Vec<dataset::TestRow>)> {
    if config.cache && !rebuild {
        if let Some(cached) = dataset::read_cache(&config.cache_dir)? {
            return Ok(cached);
        }
    }

    let (train, test) = dataset::build(config)?;
    if config.cache {
        dataset::write_cache(&config.cache_dir, &train, &test)?;
    }
    Ok((train, test))
}
