//! custload CLI for importing customer CSV files in parallel chunks.
//!
//! # Commands
//! ```text
//! custload run   --input <file.csv> [--config <job.yaml>] [--skip-limit N] [--sqlite <db>]
//! custload check --input <file.csv>
//! custload info
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use custload_core::{DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY_LIMIT, DEFAULT_COUNTRY};

mod cmd_check;
mod cmd_run;
mod config;
mod logging;

use config::{JobFileConfig, Overrides};

/// Exit code of a run whose job finished `FAILED`.
const EXIT_JOB_FAILED: u8 = 2;

#[derive(Parser)]
#[command(
    name = "custload",
    about = "Chunked, fault-tolerant import of customer CSV files",
    long_about = "
custload reads a customer CSV file, keeps the rows for one country and
upserts them into a store in parallel, transactional chunks. Rows with a
malformed id are skipped up to the configured skip limit.

ENVIRONMENT VARIABLES:
  CUSTLOAD_CONFIG       Job file (YAML)
  CUSTLOAD_INPUT        Input CSV file
  CUSTLOAD_SKIP_LIMIT   Maximum skipped rows per run
  CUSTLOAD_SQLITE       SQLite database file
  CUSTLOAD_LOG          Log level
",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "CUSTLOAD_LOG")]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Job file (YAML); flags override its values
    #[arg(short, long, env = "CUSTLOAD_CONFIG")]
    config: Option<PathBuf>,

    /// Input CSV file
    #[arg(short, long, env = "CUSTLOAD_INPUT")]
    input: Option<PathBuf>,

    /// Leading lines to drop (the header)
    #[arg(long)]
    lines_to_skip: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the import job
    Run {
        #[command(flatten)]
        input: InputArgs,

        /// Raw rows per chunk (one transaction each)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Chunks processed in parallel
        #[arg(long)]
        concurrency: Option<usize>,

        /// Maximum skipped rows before the job fails
        #[arg(long, env = "CUSTLOAD_SKIP_LIMIT")]
        skip_limit: Option<u64>,

        /// Write into this SQLite database instead of memory
        #[arg(long, env = "CUSTLOAD_SQLITE")]
        sqlite: Option<String>,
    },

    /// Map and filter every row without writing anything
    Check {
        #[command(flatten)]
        input: InputArgs,
    },

    /// Show defaults and build info
    Info,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let base = Overrides {
        log_level: cli.log_level,
        log_json: cli.log_json,
        ..Default::default()
    };

    match cli.command {
        Commands::Run {
            input,
            chunk_size,
            concurrency,
            skip_limit,
            sqlite,
        } => {
            let config = JobFileConfig::resolve(
                input.config.as_deref(),
                Overrides {
                    input: input.input,
                    lines_to_skip: input.lines_to_skip,
                    chunk_size,
                    concurrency,
                    skip_limit,
                    sqlite,
                    ..base
                },
            )?;
            logging::init_tracing(&config.log);

            let store = cmd_run::Store::open(&config).await?;
            let report = cmd_run::execute(&config, &store).await?;
            cmd_run::print(&report, input.json)?;
            Ok(if report.execution.is_completed() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_JOB_FAILED)
            })
        }

        Commands::Check { input } => {
            let config = JobFileConfig::resolve(
                input.config.as_deref(),
                Overrides {
                    input: input.input,
                    lines_to_skip: input.lines_to_skip,
                    ..base
                },
            )?;
            logging::init_tracing(&config.log);

            let report = cmd_check::execute(&config)?;
            cmd_check::print(&report, input.json)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Info => {
            cmd_info();
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn cmd_info() {
    println!("custload v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Defaults:");
    println!("  chunk size        {DEFAULT_CHUNK_SIZE}");
    println!("  concurrency       {DEFAULT_CONCURRENCY_LIMIT}");
    println!("  lines to skip     1");
    println!("  delimiter         ','");
    println!("  country filter    {DEFAULT_COUNTRY}");
    println!("  skip policy       number-format errors only");
    println!("  skip limit        (required)");
    println!();
    println!("Stores: memory, sqlite");
}
