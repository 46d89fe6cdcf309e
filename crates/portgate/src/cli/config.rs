//! Configuration display command handler.

use portgate::{PortgateConfig, PortgateResult};
use std::path::Path;

/// Load configuration from `file` or the layered sources.
pub fn load_config(file: Option<&Path>) -> PortgateResult<PortgateConfig> {
    let config = match file {
        Some(path) => PortgateConfig::from_file(path)?,
        None => PortgateConfig::load()?,
    };
    config.validate()?;
    Ok(config)
}

/// Print the effective configuration as TOML.
pub fn show_config(
    file: Option<&Path>,
    instance: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(file)?;

    let rendered = match instance {
        Some(name) => toml::to_string_pretty(&config.for_instance(name))?,
        None => toml::to_string_pretty(&config)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
