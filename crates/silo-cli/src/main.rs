//! SILO - Sensor log ingestion tool

use anyhow::Result;
use clap::Parser;
use silo_cli::commands;
use silo_common::logging::{init_logging, LogConfig, LogLevel};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "silo")]
#[command(author, version, about = "Idempotent sensor log ingestion and query tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Run an ingestion pass over the configured folder
    Run {
        /// Path to the JSON run configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Query stored sensor data as a pivoted wide table (CSV)
    Query {
        /// Path of the analytical store
        #[arg(long)]
        db: PathBuf,

        /// Plant code (e.g. "AB")
        #[arg(long)]
        plant: String,

        /// Machine code (e.g. "12")
        #[arg(long)]
        machine: String,

        /// Inclusive lower timestamp bound (e.g. 2025-06-21T14:00:00)
        #[arg(long)]
        start: Option<chrono::NaiveDateTime>,

        /// Inclusive upper timestamp bound
        #[arg(long)]
        end: Option<chrono::NaiveDateTime>,

        /// Restrict to files processed for this event
        #[arg(long)]
        event: Option<String>,

        /// Parameter name filter; repeatable
        #[arg(long = "parameter")]
        parameters: Vec<String>,

        /// Maximum number of long-format rows to read
        #[arg(long, default_value_t = 1000)]
        limit: i64,

        /// Write CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_level(log_level)
        .with_log_file_prefix("silo");

    init_logging(&log_config)?;

    match cli.command {
        Command::Run { config } => commands::run::execute(&config).await,
        Command::Query {
            db,
            plant,
            machine,
            start,
            end,
            event,
            parameters,
            limit,
            output,
        } => {
            let params = silo_ingest::query::QueryParams {
                plant_code: plant,
                machine_code: machine,
                start_time: start,
                end_time: end,
                event,
                parameter_names: if parameters.is_empty() {
                    None
                } else {
                    Some(parameters)
                },
                limit,
            };
            commands::query::execute(&db, &params, output.as_deref()).await
        },
    }
}
