//! Tessera CLI binary.
//!
//! Loads panel data into a local SQLite store and runs the walk-forward
//! batching pipeline against it.

mod error;
mod progress;
mod storage;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use error::CliError;
use progress::SpinnerObserver;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process;
use storage::Dataset;
use tessera::{
    BizDayConvention, BucketSummary, Calendar, DataPackage, Period, PipelineConfig, fetch_data_package,
    generate_schedule, map_horizon, warm_start_date,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Tessera: walk-forward panel batching for factor research", long_about = None)]
#[command(version)]
struct Cli {
    /// Log pipeline internals (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the horizon in business days for a rebalance frequency
    Horizon {
        /// Frequency such as 1w, 2w, 3m or 5b
        frequency: String,
    },

    /// Print the rebalance schedule
    Schedule {
        /// First date (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last date (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Rebalance frequency
        #[arg(long, default_value = "1w")]
        frequency: String,

        /// Business days to extend the start backwards
        #[arg(long, default_value = "0")]
        warm_start: u32,

        /// Business day convention
        #[arg(long, default_value = "following")]
        convention: BizDayConvention,

        /// Exchange holiday (repeatable)
        #[arg(long = "holiday")]
        holidays: Vec<NaiveDate>,
    },

    /// Run the pipeline against the local database
    Run {
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Database path (defaults to the user cache directory)
        #[arg(long)]
        db: Option<PathBuf>,

        /// Write the per-window summary to this CSV file
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },

    /// Load a CSV file into the local database
    Import {
        /// Target dataset
        #[arg(value_enum)]
        dataset: Dataset,

        /// CSV file with a header row
        file: PathBuf,

        /// Database path (defaults to the user cache directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Show row counts of the local database
    Stats {
        /// Database path (defaults to the user cache directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Print a default configuration
    InitConfig,
}

/// Flags that replace fields of the loaded configuration.
#[derive(Debug, Default, clap::Args)]
struct ConfigOverrides {
    /// Override `start_date`
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Override `end_date`
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Override `frequency`
    #[arg(long)]
    frequency: Option<String>,

    /// Override `batch_size`
    #[arg(long)]
    batch_size: Option<usize>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut PipelineConfig) {
        if let Some(start) = self.start {
            config.start_date = start;
        }
        if let Some(end) = self.end {
            config.end_date = end;
        }
        if let Some(frequency) = self.frequency {
            config.frequency = frequency;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = if verbose { "debug" } else { "info" };
            EnvFilter::new("warn").add_directive(format!("tessera={level}").parse()?)
        }
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Horizon { frequency } => {
            println!("{}", map_horizon(&frequency)?);
        }
        Commands::Schedule {
            start,
            end,
            frequency,
            warm_start,
            convention,
            holidays,
        } => {
            print_schedule(start, end, &frequency, warm_start, convention, holidays)?;
        }
        Commands::Run {
            config,
            db,
            summary,
            json,
            overrides,
        } => {
            let mut config = PipelineConfig::from_path(&config)?;
            overrides.apply(&mut config);
            run_pipeline(&config, db, summary.as_deref(), json)?;
        }
        Commands::Import { dataset, file, db } => {
            let (engine, path) = storage::open_or_create(db)?;
            let rows = storage::import(&engine, dataset, &file)?;
            println!("Imported {} rows into {}", rows, path.display());
        }
        Commands::Stats { db } => {
            let (engine, path) = storage::open_existing(db)?;
            let stats = engine.stats()?;
            println!("Database: {}", path.display());
            println!("  market:            {:>10}", stats.market_rows);
            println!("  factor values:     {:>10}", stats.factor_values);
            println!("  industry:          {:>10}", stats.industry_rows);
            println!("  benchmark weights: {:>10}", stats.benchmark_weights);
            println!("  risk exposures:    {:>10}", stats.risk_exposures);
            println!("  universe members:  {:>10}", stats.universe_members);
        }
        Commands::InitConfig => {
            println!("{}", PipelineConfig::default().to_json()?);
        }
    }

    Ok(())
}

fn print_schedule(
    start: NaiveDate,
    end: NaiveDate,
    frequency: &str,
    warm_start: u32,
    convention: BizDayConvention,
    holidays: Vec<NaiveDate>,
) -> Result<(), CliError> {
    let calendar = Calendar::with_holidays(holidays);
    let period: Period = frequency.parse()?;
    let first = warm_start_date(start, warm_start, &calendar)?;

    for date in generate_schedule(first, end, period, &calendar, convention)? {
        println!("{date}");
    }
    Ok(())
}

fn run_pipeline(
    config: &PipelineConfig,
    db: Option<PathBuf>,
    summary_path: Option<&Path>,
    as_json: bool,
) -> Result<(), CliError> {
    config.validate()?;
    let (engine, _) = storage::open_existing(db)?;

    let observer = SpinnerObserver::new();
    let package = match fetch_data_package(&engine, config.factor_spec(), config, &observer) {
        Ok(package) => package,
        Err(e) => {
            observer.abandon();
            return Err(e.into());
        }
    };
    observer.finish("Data package ready");

    let summary = package.summary();
    if let Some(path) = summary_path {
        write_summary(path, &summary)?;
    }

    if as_json {
        print_json(config, &package, &summary)?;
    } else {
        print_text(config, &package, &summary);
    }
    Ok(())
}

fn write_summary(path: &Path, summary: &[BucketSummary]) -> Result<(), CliError> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in summary {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn print_json(
    config: &PipelineConfig,
    package: &DataPackage,
    summary: &[BucketSummary],
) -> Result<(), CliError> {
    let output = json!({
        "frequency": config.frequency,
        "batch_size": config.batch_size,
        "x_names": package.x_names,
        "settlement_rows": package.settlement.height(),
        "windows": summary,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(config: &PipelineConfig, package: &DataPackage, summary: &[BucketSummary]) {
    println!("\nWalk-forward batches ({}, batch size {})", config.frequency, config.batch_size);
    println!("Features: {}", package.x_names.join(", "));
    println!("Settlement rows: {}\n", package.settlement.height());

    println!("{:<12} {:>10} {:>12} {:>8}", "Date", "Train", "Predict", "Target");
    println!("{}", "-".repeat(45));
    for row in summary {
        println!(
            "{:<12} {:>10} {:>12} {:>8}",
            row.date.to_string(),
            row.train_rows,
            row.predict_rows,
            if row.has_predict_target { "yes" } else { "no" }
        );
    }
}
