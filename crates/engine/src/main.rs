use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use ratings_core::{
    init_logging, load_dotenv, ConfigLoader, CsvMatrixProvider, CsvMetricsLogger, DatasetConfig,
    LogConfig, LogFormat, MatrixProvider, RunConfig,
};
use ratings_engine::{record_run, Operation, Pipeline, RunReport};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "ratings-runner")]
#[command(about = "Collaborative-filtering rating prediction", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(
        long,
        global = true,
        env = "RATINGS_CONFIG",
        default_value = "config.json",
        help = "JSON settings file"
    )]
    config: PathBuf,

    #[arg(long, global = true, help = "Rebuild the cached matrices from the ratings file")]
    rebuild: bool,

    #[arg(long, global = true, default_value = "pretty", help = "Log format (pretty or json)")]
    log_format: LogFormat,

    #[arg(long, global = true, help = "Print the run report as JSON")]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Predict the test split with the item-similarity predictor")]
    Neighborhood,

    #[command(about = "Train a factor model and predict the test split")]
    Factorization,
}

impl From<&Commands> for Operation {
    fn from(command: &Commands) -> Self {
        match command {
            Commands::Neighborhood => Operation::Neighborhood,
            Commands::Factorization => Operation::Factorization,
        }
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    load_dotenv();

    let cli = Cli::parse();

    init_logging(&LogConfig {
        format: cli.log_format,
        ..LogConfig::default()
    })
    .context("Failed to initialize logging")?;

    let run_config = RunConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load run settings from {}", cli.config.display()))?;
    run_config.validate().context("Invalid run settings")?;

    let dataset_config = DatasetConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load dataset settings from {}", cli.config.display()))?;
    dataset_config.validate().context("Invalid dataset settings")?;

    let logger = CsvMetricsLogger::new(dataset_config.metrics_log_path.clone());
    let provider = CsvMatrixProvider::new(dataset_config).with_seed(run_config.seed);
    let splits = provider
        .get_splits(cli.rebuild)
        .context("Failed to load the rating matrices")?;

    let operation = Operation::from(&cli.command);
    info!(%operation, "Starting run");

    let report = Pipeline::new(&run_config, &splits)
        .run(operation)
        .with_context(|| format!("{} run failed", operation))?;
    record_run(&logger, &run_config, &report);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{} {}", "Operation:".bold(), report.operation);
    println!("{} {}", "RMSE:".bold(), format!("{:.6}", report.rmse).green());
    println!("{} {:.2}s", "Elapsed:".bold(), report.elapsed_seconds);

    if let Some(params) = report.best_params {
        println!(
            "{} k={} epochs={} alpha={:.4} lambda={:.4}",
            "Parameters:".bold(),
            params.latent_factors,
            params.epochs,
            params.alpha,
            params.lambda
        );
    }
    if !report.trials.is_empty() {
        println!("{} {}", "Trials:".bold(), report.trials.len());
    }
}
