//! Configuration loading, environment overrides, and validation.

use super::Config;
use crate::error::ConfigError;
use crate::model::ModelSpec;
use crate::secret::SecretString;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Environment variable consulted when the config file carries no API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default config file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json5";

impl Config {
    /// Read and parse a JSON5 config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::parse(&content)?;
        config.apply_env();
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse JSON5 text into a config.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        json5::from_str(content).map_err(|e| ConfigError::Json5(e.to_string()))
    }

    /// Fill in values that may come from the environment.
    pub fn apply_env(&mut self) {
        self.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
    }

    /// Use `value` as the API key if the file did not provide one.
    pub fn apply_api_key_override(&mut self, value: Option<String>) {
        if !self.api_key.is_empty() {
            return;
        }
        if let Some(key) = value.filter(|k| !k.trim().is_empty()) {
            self.api_key = SecretString::new(key);
        }
    }

    /// Write the config atomically through a sibling temp file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_json5()?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Render as pretty JSON, which is valid JSON5.
    pub fn to_json5(&self) -> Result<String, ConfigError> {
        // json5 has no serializer; plain JSON is valid JSON5.
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Resolve the configured model in the catalog.
    pub fn model_spec(&self) -> Result<&'static ModelSpec, ConfigError> {
        ModelSpec::lookup(&self.model).ok_or_else(|| ConfigError::UnknownModel(self.model.clone()))
    }

    /// Check every field and report all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let unknown_model = self.model_spec().err();
        if unknown_model.is_some() {
            errors.push(format!("model {} is not supported", self.model));
        }

        if self.api_key.is_empty() {
            errors.push(format!(
                "apiKey is empty (set it in the config file or via {})",
                API_KEY_ENV
            ));
        }

        if self.api_base.trim().is_empty() {
            errors.push("apiBase must not be empty".to_string());
        }

        if self.port == 0 {
            errors.push("port cannot be 0".to_string());
        }

        if self.max_length == 0 {
            errors.push("maxLength must be greater than 0".to_string());
        }

        if self.assets_dir.as_os_str().is_empty() {
            errors.push("assetsDir must not be empty".to_string());
        }

        let keepalive = &self.keepalive;
        if keepalive.ping_period_secs == 0 {
            errors.push("keepalive.pingPeriodSecs must be greater than 0".to_string());
        }
        if keepalive.write_wait_secs == 0 {
            errors.push("keepalive.writeWaitSecs must be greater than 0".to_string());
        }
        if keepalive.ping_period_secs >= keepalive.pong_wait_secs {
            errors.push(format!(
                "keepalive.pingPeriodSecs ({}) must be shorter than keepalive.pongWaitSecs ({})",
                keepalive.ping_period_secs, keepalive.pong_wait_secs
            ));
        }

        // An unknown model on its own keeps its dedicated error kind.
        match (unknown_model, errors.len()) {
            (_, 0) => Ok(()),
            (Some(err), 1) => Err(err),
            _ => Err(ConfigError::Validation(errors.join("; "))),
        }
    }
}
