//! Configuration check command.

use crate::load_config;
use std::path::Path;

/// Load and validate the configuration, then summarize it.
pub fn run(config_path: &Path) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    config.validate()?;
    let model = config.model_spec()?;

    println!("Configuration OK: {}", config_path.display());
    println!("  model:    {} ({})", model.id, model.family);
    println!("  port:     {}", config.port);
    println!("  interval: {}s", config.interval_seconds);
    println!("  assets:   {}", config.assets_dir.display());
    Ok(())
}
