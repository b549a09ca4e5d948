//! Config scaffolding command.

use chatrelay_core::Config;
use std::path::Path;

/// Write a default configuration to `config_path`.
///
/// Refuses to replace an existing file unless `force` is set. The API key is
/// left blank so no credential is ever written by this command.
pub fn run(config_path: &Path, force: bool) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    Config::default().save(config_path)?;

    println!("Created config file: {}", config_path.display());
    println!(
        "  Set apiKey (or {}) before running 'chatrelay serve'.",
        chatrelay_core::config::API_KEY_ENV
    );
    Ok(())
}
