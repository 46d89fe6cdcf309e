//! CLI command definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Portgate - per-port admission control for rate-limited APIs
#[derive(Parser, Debug)]
#[command(name = "portgate")]
#[command(about = "Per-port admission control for rate-limited APIs", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of the layered defaults
    #[arg(long, global = true)]
    pub file: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration
    Config {
        /// Show the limits for this named instance instead of the defaults
        #[arg(long)]
        instance: Option<String>,
    },

    /// Drive a supervisor with synthetic concurrent calls
    Simulate {
        /// Port the calls target
        #[arg(long, default_value = "simulated")]
        port: String,

        /// Number of concurrent calls
        #[arg(long, default_value = "10")]
        calls: usize,

        /// How long each call holds its slot, in milliseconds
        #[arg(long, default_value = "100")]
        op_ms: u64,

        /// Number of executions that fail with a rate limit
        #[arg(long, default_value = "0")]
        rate_limited: usize,

        /// Use the limits of this named instance
        #[arg(long)]
        instance: Option<String>,

        /// Override the per-port slot count
        #[arg(long)]
        max_one_time_req: Option<usize>,

        /// Override the polling interval, in milliseconds
        #[arg(long)]
        check_delay_ms: Option<u64>,

        /// Override the admission attempt budget
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Output format
        #[arg(long, default_value = "human")]
        format: OutputFormat,
    },
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}
