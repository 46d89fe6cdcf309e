//! Command-line interface module.
//!
//! This module provides the CLI structure and command handlers for the portgate binary.

mod commands;
mod config;
mod simulate;

pub use commands::{Cli, Commands, OutputFormat};
pub use config::show_config;
pub use simulate::{LimitOverrides, run_simulation};
