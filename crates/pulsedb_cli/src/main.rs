//! PulseDB CLI
//!
//! Command-line tools for exercising a PulseDB recorder.
//!
//! # Commands
//!
//! - `snapshot` - Print the status document built from a snapshot file
//! - `heartbeat` - Run a recorder for a number of heartbeats
//! - `version` - Show version information

mod commands;
mod provider;

use clap::{Parser, Subcommand};
use pulsedb_core::RecorderConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// PulseDB status recorder tools.
#[derive(Parser)]
#[command(name = "pulsedb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a JSON recorder configuration
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the status document that would be stored for a snapshot
    Snapshot {
        /// Snapshot JSON written by the host prober
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run a recorder on in-memory stores for a number of heartbeats
    Heartbeat {
        /// Snapshot JSON written by the host prober
        #[arg(short, long)]
        input: PathBuf,

        /// Time between beats in milliseconds (0 writes a single beat)
        #[arg(long, default_value = "1000")]
        interval_ms: u64,

        /// Number of beats to wait for
        #[arg(short, long, default_value = "3")]
        beats: u64,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => RecorderConfig::from_json_file(path)?,
        None => RecorderConfig::new("memory://local").serial("SN-CLI"),
    };

    match cli.command {
        Commands::Snapshot { input } => {
            commands::snapshot::run(&config, &input)?;
        }
        Commands::Heartbeat {
            input,
            interval_ms,
            beats,
        } => {
            commands::heartbeat::run(config, &input, interval_ms, beats).await?;
        }
        Commands::Version => {
            println!("PulseDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("PulseDB Core v{}", pulsedb_core::VERSION);
        }
    }

    Ok(())
}
