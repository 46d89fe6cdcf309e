//! Tracing subscriber setup for the binary and embedders.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DIRECTIVES: &str = "info,portgate=debug";

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new(DEFAULT_DIRECTIVES)
        }
    })
}

/// Initialize human-readable console logging.
///
/// `RUST_LOG` takes precedence; otherwise logs at `info`, with the portgate
/// crates at `debug`, or everything at `debug` when `verbose` is set.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_console_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;
    Ok(())
}

/// Initialize newline-delimited JSON logging, for log shippers.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_json_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(env_filter(verbose))
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()?;
    Ok(())
}
