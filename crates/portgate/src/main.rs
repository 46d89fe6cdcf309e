//! Portgate CLI binary.
//!
//! This binary provides command-line access to Portgate's functionality:
//! - Inspect the effective limiter configuration
//! - Simulate bursts of calls against a supervised port

use clap::Parser;
use std::time::Duration;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{Cli, Commands, LimitOverrides, run_simulation, show_config};
    use portgate::{Simulation, init_console_tracing, init_json_tracing};

    // Parse command-line arguments
    let cli = Cli::parse();

    if cli.json_logs {
        init_json_tracing(cli.verbose)?;
    } else {
        init_console_tracing(cli.verbose)?;
    }

    // Execute the requested command
    match cli.command {
        Commands::Config { instance } => {
            show_config(cli.file.as_deref(), instance.as_deref())?;
        }

        Commands::Simulate {
            port,
            calls,
            op_ms,
            rate_limited,
            instance,
            max_one_time_req,
            check_delay_ms,
            max_attempts,
            format,
        } => {
            let simulation = Simulation::new(port, calls, Duration::from_millis(op_ms))
                .with_rate_limited(rate_limited);
            let overrides = LimitOverrides {
                instance,
                max_one_time_req,
                check_delay_ms,
                max_attempts,
            };
            run_simulation(cli.file.as_deref(), simulation, overrides, format).await?;
        }
    }

    Ok(())
}
