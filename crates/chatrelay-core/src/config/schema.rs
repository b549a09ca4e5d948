//! Configuration schema definitions.

use crate::secret::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default upstream API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Main ChatRelay configuration.
///
/// Loaded once at startup and shared read-only afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Provider API key. Falls back to `OPENAI_API_KEY` when blank.
    #[serde(default)]
    pub api_key: SecretString,

    /// Provider API base URL (OpenAI or a compatible server).
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Minimum number of seconds between two accepted requests of a session.
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Model identifier; must be present in the model catalog.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum number of tokens generated per reply.
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Enable a permissive CORS layer.
    #[serde(default)]
    pub cors: bool,

    /// Directory generated images are written to and served from.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,

    /// Keepalive timings.
    #[serde(default)]
    pub keepalive: KeepaliveConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: SecretString::default(),
            api_base: default_api_base(),
            port: default_port(),
            interval_seconds: default_interval_seconds(),
            model: default_model(),
            max_length: default_max_length(),
            cors: false,
            assets_dir: default_assets_dir(),
            keepalive: KeepaliveConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Minimum interval between accepted requests.
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_interval_seconds() -> u64 {
    2
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_max_length() -> usize {
    1024
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

/// Keepalive timings.
///
/// The ping period must be shorter than the pong wait, otherwise a healthy
/// but idle connection would hit its read deadline before the next probe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepaliveConfig {
    /// Seconds between liveness probes.
    #[serde(default = "default_ping_period")]
    pub ping_period_secs: u64,

    /// Seconds of silence after which the connection is considered dead.
    #[serde(default = "default_pong_wait")]
    pub pong_wait_secs: u64,

    /// Write deadline applied to each probe.
    #[serde(default = "default_write_wait")]
    pub write_wait_secs: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_period_secs: default_ping_period(),
            pong_wait_secs: default_pong_wait(),
            write_wait_secs: default_write_wait(),
        }
    }
}

impl KeepaliveConfig {
    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.ping_period_secs)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn write_wait(&self) -> Duration {
        Duration::from_secs(self.write_wait_secs)
    }
}

fn default_ping_period() -> u64 {
    50
}

fn default_pong_wait() -> u64 {
    60
}

fn default_write_wait() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Default level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
