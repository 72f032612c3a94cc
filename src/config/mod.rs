//! Configuration module for the exporter.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (bind address, port, metrics path)
//! - Liquidsoap settings (control endpoint, timeouts, level command convention)

mod app;
mod validation;

pub use app::{AppConfig, LiquidsoapConfig, ServerConfig};
pub use validation::{ConfigError, expand_env_vars};

// Re-export constants
pub use app::{DEFAULT_COMMAND_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_METRICS_PATH};
