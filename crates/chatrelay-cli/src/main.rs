//! ChatRelay CLI entry point.

use chatrelay_cli::{default_log_filter, run, Cli};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_log_filter(&cli).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Run the command
    run(cli).await
}
