//! Serve command.

use crate::load_config;
use chatrelay_gateway::Gateway;
use chatrelay_providers::{openai::OpenAIProvider, Provider};
use clap::Args;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Serve command arguments.
#[derive(Args)]
pub struct ServeArgs {
    /// Listen port, overriding the config file
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Run the gateway until ctrl-c.
pub async fn run(config_path: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(port) = args.port {
        config.port = port;
    }
    config.validate()?;

    let provider = OpenAIProvider::from_config(&config)?;
    info!("Using {} provider at {}", provider.name(), config.api_base);

    let gateway = Gateway::new(&config, Arc::new(provider))?;
    let shutdown = gateway.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!("Failed to listen for ctrl-c: {}", e),
        }
        shutdown.cancel();
    });

    gateway.run().await?;
    Ok(())
}
