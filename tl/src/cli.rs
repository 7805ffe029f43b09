//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Timelapse - drift-corrected unattended capture runner
#[derive(Debug, Parser)]
#[command(
    name = "tl",
    about = "Unattended timelapse capture with drift-corrected timing",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a timelapse session until stopped or a limit is reached
    Run {
        /// Capture interval in seconds (overrides config)
        #[arg(short, long)]
        interval: Option<f64>,

        /// Run length in hours, 0 = indefinite (overrides config)
        #[arg(short, long)]
        duration: Option<f64>,

        /// Stop after this many captures
        #[arg(short = 'n', long)]
        max_captures: Option<u64>,

        /// Log captures without running the capture command
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the effective configuration
    Config {
        /// Only check the configuration and report problems
        #[arg(long)]
        validate: bool,
    },
}
