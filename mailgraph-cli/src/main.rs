//! Mailgraph CLI — terminal front end for the communication-graph explorer.
//!
//! Provides one-shot reports and an interactive filtering session.

mod commands;
mod session;

use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Mailgraph: explore who wrote to whom, and when
#[derive(Parser, Debug)]
#[command(name = "mailgraph", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (dataset paths are resolved against it)
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Entity file, overriding the configured path
    #[arg(long)]
    entities: Option<PathBuf>,

    /// Event file, overriding the configured path
    #[arg(long)]
    events: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Show dataset counts, rank bounds and the covered date span
    Summary,
    /// Print the events-per-day histogram
    Histogram {
        /// Emit `[day_millis, total]` pairs as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the entities and relations visible under a filter
    Filter {
        /// Minimum connectivity degree
        #[arg(short, long, default_value = "0")]
        degree: usize,
        /// First day of the range (YYYY-MM-DD)
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day of the range (YYYY-MM-DD)
        #[arg(long)]
        to: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Show details and connected relations for one entity
    Inspect {
        /// Entity id
        id: String,
    },
    /// Interactive filtering session
    Session,
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum ConfigAction {
    /// Create a default configuration file in the workspace
    Init,
    /// Show the current effective configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr (always active)
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("dev", "mailgraph", "mailgraph")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mailgraph.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    // Resolve workspace
    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    // Load configuration
    let mut config = mailgraph_core::config::load_config(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    // Apply CLI overrides
    if let Some(entities) = cli.entities {
        config.data.entity_path = entities;
    }
    if let Some(events) = cli.events {
        config.data.event_path = events;
    }

    commands::handle_command(cli.command, config, &workspace).await
}
