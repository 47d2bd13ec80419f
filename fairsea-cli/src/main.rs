//! FAIR-SEA CLI: run demographic bias analyses over model output datasets.

mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// FAIR-SEA: demographic bias metrics for language model outputs
#[derive(Parser, Debug)]
#[command(name = "fairsea", version, about, long_about = None)]
struct Cli {
    /// Workspace directory
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

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
enum Commands {
    /// Run one or every prompt-family pipeline and write the result bundle
    Run {
        /// Record file (.csv, .json or .jsonl)
        #[arg(short, long)]
        input: PathBuf,
        /// Prompt family code (D1..D4, I1..I4)
        #[arg(short, long, conflicts_with = "all")]
        family: Option<String>,
        /// Run every family present in the input (default without --family)
        #[arg(long)]
        all: bool,
        /// Write JSON here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Analyze outputs as loaded, without normalization
        #[arg(long)]
        raw_outputs: bool,
        /// Skip fetching reference statistics
        #[arg(long)]
        offline: bool,
    },
    /// List the prompt families found in a record file
    Families {
        /// Record file (.csv, .json or .jsonl)
        #[arg(short, long)]
        input: PathBuf,
    },
    /// Show a deterministic preview of one family's prompts and outputs
    Sample {
        /// Record file (.csv, .json or .jsonl)
        #[arg(short, long)]
        input: PathBuf,
        /// Prompt family code
        #[arg(short, long)]
        family: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Write a default configuration file to the workspace
    Init,
    /// Show the effective configuration
    Show,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    // Human-readable layer for stderr
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    // JSON file layer for structured logging
    let log_dir = directories::ProjectDirs::from("org", "fairsea", "fairsea")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "fairsea.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    commands::handle_command(cli.command, &workspace, cli.config.as_deref())
}
