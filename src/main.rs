//! Almanac CLI
//!
//! Command-line interface over a configured backend:
//! - Query a time span and print the result as delimited text
//! - Import a delimited file into the store

use almanac::{store, Codec, Config, Query, WriteOptions};
use anyhow::Context;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "almanac")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chunked time-series store for numeric observations")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a time span and print it as CSV
    Get {
        /// Span start, e.g. "2024-01-15" or "2024-01-15 06:00:00"
        start: String,
        /// Span end (default: the remainder of the bucket containing start)
        #[arg(short, long)]
        end: Option<String>,
        /// Resample to this cadence in seconds (ignored at 900 or below)
        #[arg(short, long)]
        interval: Option<i64>,
        /// Subdirectory below the store's base directory
        #[arg(short, long, default_value = "")]
        subdir: String,
    },

    /// Import a delimited file into the store
    Put {
        /// Path to the file to import
        path: PathBuf,
        /// Bucket selector (default: the file's first timestamp)
        #[arg(short, long)]
        time: Option<String>,
        /// Subdirectory below the store's base directory
        #[arg(short, long, default_value = "")]
        subdir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default()?,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| format!("almanac={}", config.logging.level)),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let timezone = config.backend.parse_timezone()?;
    let mut backend = store::open(&config.backend)?;

    match cli.command {
        Commands::Get {
            start,
            end,
            interval,
            subdir,
        } => {
            let mut query = Query::new(parse_time(&start, timezone)?).subdir(subdir);
            if let Some(end) = end {
                query = query.end(parse_time(&end, timezone)?);
            }
            if let Some(interval) = interval {
                query = query.interval(interval);
            }

            let table = backend.get(&query)?;
            tracing::info!(rows = table.len(), "query complete");
            print!("{}", table);
        }

        Commands::Put { path, time, subdir } => {
            let codec = Codec::from_config(&config.backend)?;
            let table = codec.read(&path)?;

            let mut options = WriteOptions::new().subdir(subdir);
            if let Some(time) = time {
                options = options.time(parse_time(&time, timezone)?);
            }
            backend.persist(&table, &options)?;
            tracing::info!(rows = table.len(), path = %path.display(), "imported");
        }
    }

    backend.close()?;
    Ok(())
}

/// Parse a CLI timestamp; naive inputs are interpreted in the configured zone
fn parse_time(raw: &str, timezone: Tz) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(raw) {
        return Ok(time.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .or_else(|_| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap())
        })
        .with_context(|| format!("could not parse time '{}'", raw))?;

    timezone
        .from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("time '{}' does not exist in {}", raw, timezone))
        .map(|t| t.with_timezone(&Utc))
}
