//! # chatrelay-core
//!
//! Core types, configuration, and utilities for ChatRelay.
//!
//! This crate provides shared functionality used across all ChatRelay crates:
//!
//! - **Configuration**: Loading, validation, and environment overrides
//! - **Models**: The immutable catalog of supported model identifiers
//! - **Utilities**: Secret handling and ID generation

pub mod config;
pub mod error;
pub mod id;
pub mod model;
pub mod secret;

// Re-exports for convenience
pub use config::Config;
pub use error::{ConfigError, Result};
pub use model::{ModelFamily, ModelSpec, SamplingParams};
pub use secret::SecretString;
