//! Recent-orders feed - Entry Point
//!
//! `run` hydrates the feed, optionally backfills from a snapshot file and
//! then ingests live payloads from stdin, one JSON document per line.

use anyhow::Result;
use clap::{Parser, Subcommand};
use orderfeed_app::{AppConfig, Application};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::info;

/// Bounded, deduplicated feed of the most recent orders
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via ORDERFEED_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest live payloads from stdin until EOF or Ctrl-C (default)
    Run {
        /// Snapshot file to backfill from before going live
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Print Prometheus metrics on exit
        #[arg(long)]
        print_metrics: bool,
    },
    /// Print the persisted feed
    Show,
    /// Empty the feed and its persisted copy
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    orderfeed_telemetry::init_logging()?;

    info!("Starting orderfeed v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > ORDERFEED_CONFIG > config/default.toml
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::load()?,
    };
    info!(
        capacity = config.feed.capacity,
        storage_key = %config.feed.storage_key,
        backend = ?config.storage.backend,
        "Configuration loaded"
    );

    let app = Application::new(config)?;
    app.start();

    match args.command.unwrap_or(Command::Run {
        snapshot: None,
        print_metrics: false,
    }) {
        Command::Run {
            snapshot,
            print_metrics,
        } => {
            if let Some(path) = snapshot {
                app.backfill_from_file(&path).await?;
            }
            app.run(BufReader::new(tokio::io::stdin())).await?;
            print!("{}", app.render());
            if print_metrics {
                print!("{}", orderfeed_telemetry::Metrics::render()?);
            }
        }
        Command::Show => print!("{}", app.render()),
        Command::Clear => {
            app.clear()?;
            info!("Feed cleared");
        }
    }

    Ok(())
}
