// src/main.rs
mod edgar;
mod extractors;
mod pipeline;
mod storage;
mod tasks;
mod utils;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use edgar::client::{AcquireConfig, DEFAULT_ARCHIVE_BASE_URL, DEFAULT_TICKER_URL, DEFAULT_USER_AGENT};
use edgar::models::DatasetId;
use edgar::retry::RetryPolicy;
use extractors::batch::{self, BatchDispatcher};
use extractors::statement::NormalizeOptions;
use pipeline::TransformConfig;
use tasks::{TaskRegistry, TaskStatus};
use utils::AppError;

/// Turns SEC Financial Statement Data Sets into per-company JSON documents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding downloaded archives and ticker.txt
    #[arg(long, env = "SEC_DATA_DIR", default_value = "./data", global = true)]
    data_dir: PathBuf,

    /// Root directory for the JSON documents
    #[arg(long, env = "SEC_OUTPUT_DIR", default_value = "./exportfiles", global = true)]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download a quarter's dataset archive and the ticker table
    Acquire {
        #[command(flatten)]
        quarter: QuarterArgs,
        #[command(flatten)]
        http: HttpArgs,
    },
    /// Transform a downloaded quarter into JSON documents
    Transform {
        #[command(flatten)]
        quarter: QuarterArgs,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Download then transform, skipping quarters that were already exported
    Run {
        #[command(flatten)]
        quarter: QuarterArgs,
        #[command(flatten)]
        http: HttpArgs,
        #[command(flatten)]
        batch: BatchArgs,
        /// Re-export even if the output directory already has documents
        #[arg(long)]
        force: bool,
        /// Seconds between task status polls
        #[arg(long, default_value = "10")]
        poll_secs: u64,
    },
    /// Remove the data and output directories
    Clean,
}

#[derive(Args, Debug)]
struct QuarterArgs {
    /// Dataset year, e.g. 2024
    #[arg(short, long)]
    year: u16,

    /// Dataset quarter (1-4)
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=4))]
    quarter: u8,
}

#[derive(Args, Debug)]
struct HttpArgs {
    /// User-Agent sent to sec.gov (name and contact email)
    #[arg(long, env = "SEC_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    #[arg(long, env = "SEC_ARCHIVE_BASE_URL", default_value = DEFAULT_ARCHIVE_BASE_URL)]
    archive_base_url: String,

    #[arg(long, env = "SEC_TICKER_URL", default_value = DEFAULT_TICKER_URL)]
    ticker_url: String,

    /// Connect and per-read timeout in seconds (a transfer that keeps receiving data is not cut off)
    #[arg(long, default_value = "30")]
    read_timeout_secs: u64,

    /// Download attempts before giving up
    #[arg(long, default_value = "3")]
    max_attempts: u32,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Submissions per chunk
    #[arg(long, env = "SEC_CHUNK_SIZE", default_value_t = batch::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Concurrent normalizations (defaults to available CPUs)
    #[arg(long, env = "SEC_WORKERS")]
    workers: Option<usize>,

    /// Give up on a single submission after this many seconds
    #[arg(long)]
    task_timeout_secs: Option<u64>,

    /// Log facts filed under statements other than BS/CF/IC
    #[arg(long)]
    report_other_statements: bool,
}

impl HttpArgs {
    fn into_config(self, data_dir: &Path) -> AcquireConfig {
        AcquireConfig {
            data_dir: data_dir.to_path_buf(),
            archive_base_url: self.archive_base_url,
            ticker_url: self.ticker_url,
            user_agent: self.user_agent,
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            retry: RetryPolicy {
                max_attempts: self.max_attempts.max(1),
                ..Default::default()
            },
        }
    }
}

impl BatchArgs {
    fn into_config(self, data_dir: &Path, output_dir: &Path) -> Result<TransformConfig, AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("--chunk-size must be at least 1".to_string()));
        }
        Ok(TransformConfig {
            data_dir: data_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            dispatcher: BatchDispatcher {
                chunk_size: self.chunk_size,
                workers: self.workers.unwrap_or_else(batch::default_workers),
                task_timeout: self.task_timeout_secs.map(Duration::from_secs),
                options: NormalizeOptions {
                    report_other_statements: self.report_other_statements,
                },
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    utils::logging::setup_logging();

    // 2. Parse CLI Arguments
    let cli = Cli::parse();
    tracing::debug!("Starting with args: {:?}", cli);

    match cli.command {
        Command::Acquire { quarter, http } => {
            let dataset = DatasetId::new(quarter.year, quarter.quarter);
            if !pipeline::acquire(http.into_config(&cli.data_dir), dataset).await {
                return Err(AppError::Processing(format!("Download of {} failed", dataset)));
            }
        }
        Command::Transform { quarter, batch } => {
            let dataset = DatasetId::new(quarter.year, quarter.quarter);
            let config = batch.into_config(&cli.data_dir, &cli.output_dir)?;
            let report = pipeline::transform(&config, dataset).await?;
            println!("{}", report.written);
        }
        Command::Run {
            quarter,
            http,
            batch,
            force,
            poll_secs,
        } => {
            let dataset = DatasetId::new(quarter.year, quarter.quarter);
            let export_dir = cli.output_dir.join(dataset.stem());
            if !force && has_documents(&export_dir) {
                tracing::info!("{} already processed ({}), skipping", dataset, export_dir.display());
                return Ok(());
            }

            let transform_config = batch.into_config(&cli.data_dir, &cli.output_dir)?;
            let registry = TaskRegistry::new();
            let poll = Duration::from_secs(poll_secs.max(1));

            let id = registry
                .spawn_acquire(http.into_config(&cli.data_dir), dataset)
                .await;
            if registry.wait(id, poll).await != TaskStatus::Success {
                return Err(AppError::Processing(format!("Download of {} failed", dataset)));
            }

            let id = registry
                .spawn_transform(transform_config, dataset)
                .await;
            if registry.wait(id, poll).await != TaskStatus::Success {
                return Err(AppError::Processing(format!("Transform of {} failed", dataset)));
            }
        }
        Command::Clean => {
            for dir in [&cli.data_dir, &cli.output_dir] {
                match std::fs::remove_dir_all(dir) {
                    Ok(()) => tracing::info!("Removed {}", dir.display()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }

    Ok(())
}

fn has_documents(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
