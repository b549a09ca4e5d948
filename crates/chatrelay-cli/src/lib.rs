//! ChatRelay command-line interface.

pub mod commands;

use anyhow::Context;
use chatrelay_core::config::DEFAULT_CONFIG_FILE;
use chatrelay_core::Config;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// ChatRelay - streaming chat gateway
#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "CHATRELAY_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve(commands::serve::ServeArgs),

    /// Load and validate the configuration
    Check,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// List supported models
    Models {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve(args) => commands::serve::run(&cli.config, args).await,
        Commands::Check => commands::check::run(&cli.config),
        Commands::Init { force } => commands::init::run(&cli.config, force),
        Commands::Models { json } => commands::models::run(json),
        Commands::Version => {
            println!("chatrelay {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Load the configuration file, with the path in the error context.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    Config::load(path).with_context(|| format!("failed to load {}", path.display()))
}

/// Log filter used when `RUST_LOG` is unset.
///
/// `-v` and `-vv` win over the level in the config file; an unreadable
/// config falls back to `info`.
pub fn default_log_filter(cli: &Cli) -> String {
    let level = match cli.verbose {
        0 => Config::load(&cli.config)
            .map(|c| c.logging.level)
            .unwrap_or_else(|_| "info".to_string()),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    format!("chatrelay={}", level)
}
