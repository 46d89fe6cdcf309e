//! Simulation command handler.

use super::{OutputFormat, config::load_config};
use portgate::Simulation;
use std::path::Path;
use std::time::Duration;

/// Limit overrides taken from the command line.
#[derive(Debug, Clone, Default)]
pub struct LimitOverrides {
    pub instance: Option<String>,
    pub max_one_time_req: Option<usize>,
    pub check_delay_ms: Option<u64>,
    pub max_attempts: Option<u32>,
}

/// Run a simulation and print its report.
pub async fn run_simulation(
    file: Option<&Path>,
    simulation: Simulation,
    overrides: LimitOverrides,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(file)?;
    let mut limits = match overrides.instance.as_deref() {
        Some(name) => config.for_instance(name),
        None => config.limiter.clone(),
    };
    if let Some(slots) = overrides.max_one_time_req {
        limits = limits.with_max_one_time_req(slots);
    }
    if let Some(delay) = overrides.check_delay_ms {
        limits = limits.with_check_delay_ms(delay);
    }
    if let Some(attempts) = overrides.max_attempts {
        limits = limits.with_max_attempts(attempts);
    }

    limits.validate()?;

    tracing::info!(
        max_one_time_req = limits.max_one_time_req(),
        check_delay = ?limits.check_delay(),
        worst_case_wait = ?limits.max_admission_wait(),
        "Starting simulation"
    );
    let report = simulation.run(limits).await?;

    match format {
        OutputFormat::Human => println!("{}", report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}
