//! Spillway CLI
//!
//! Command-line tools for Spillway.
//!
//! # Commands
//!
//! - `bench` - Push a generated stream through a file-backed buffer
//! - `inspect` - List the frames of a segment file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Spillway command-line tools.
#[derive(Parser)]
#[command(name = "spillway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push a generated stream through a file-backed buffer
    Bench {
        /// Number of messages to emit
        #[arg(short, long, default_value = "100000")]
        count: u64,

        /// Size of each message in bytes
        #[arg(short, long, default_value = "64")]
        message_size: usize,

        /// Start a new segment every N records
        #[arg(long, conflicts_with_all = ["rollover_bytes", "no_rollover"])]
        rollover_every: Option<u64>,

        /// Start a new segment once a segment holds N bytes
        #[arg(long, conflicts_with = "no_rollover")]
        rollover_bytes: Option<u64>,

        /// Write everything into a single segment
        #[arg(long)]
        no_rollover: bool,

        /// Directory for segment files (defaults to the system temp dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Drain on a dedicated thread
        #[arg(short, long = "async")]
        asynchronous: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// List the frames of a segment file
    Inspect {
        /// Segment file to read
        file: PathBuf,

        /// Maximum number of frames to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Bench {
            count,
            message_size,
            rollover_every,
            rollover_bytes,
            no_rollover,
            dir,
            asynchronous,
            format,
        } => {
            let rollover = if no_rollover {
                commands::bench::Rollover::Disabled
            } else if let Some(records) = rollover_every {
                commands::bench::Rollover::Records(records)
            } else if let Some(bytes) = rollover_bytes {
                commands::bench::Rollover::Bytes(bytes)
            } else {
                commands::bench::Rollover::Default
            };
            let settings = commands::bench::Settings {
                count,
                message_size,
                rollover,
                dir,
                asynchronous,
            };
            commands::bench::run(&settings, &format)?;
        }
        Commands::Inspect {
            file,
            limit,
            format,
        } => {
            commands::inspect::run(&file, limit, &format)?;
        }
        Commands::Version => {
            println!("Spillway CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Spillway Core v{}", spillway_core::VERSION);
        }
    }

    Ok(())
}
