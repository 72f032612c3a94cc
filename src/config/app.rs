//! Application configuration structures.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::DEFAULT_LISTING_COMMAND;
use crate::liquidsoap::Endpoint;

use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default scrape path.
pub const DEFAULT_METRICS_PATH: &str = "/metrics";

/// Default bound on opening the control connection (5 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on one command/reply cycle (5 seconds).
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Path served by the liveness probe.
const HEALTH_PATH: &str = "/healthz";

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

fn default_rms_suffix() -> String {
    "_rms".to_string()
}

fn default_listing_command() -> String {
    DEFAULT_LISTING_COMMAND.to_string()
}

// =============================================================================
// Server Configuration
// =============================================================================

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "127.0.0.1").
    pub bind: String,

    /// Server port (default: 8080).
    pub port: u16,

    /// Scrape endpoint path (default: "/metrics").
    pub metrics_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
        }
    }
}

// =============================================================================
// Liquidsoap Configuration
// =============================================================================

/// Control connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidsoapConfig {
    /// Control endpoint (default: `unix: ./silent-check.sock`).
    #[serde(default)]
    pub endpoint: Endpoint,

    /// Timeout for opening the connection (default: 5s).
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Timeout for one command/reply cycle (default: 5s).
    #[serde(default = "default_command_timeout", with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Suffix of the level commands, `<source><suffix>.rms` (default: "_rms").
    #[serde(default = "default_rms_suffix")]
    pub rms_suffix: String,

    /// Command whose reply lists the level commands (default: "help").
    #[serde(default = "default_listing_command")]
    pub listing_command: String,
}

impl Default for LiquidsoapConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            rms_suffix: default_rms_suffix(),
            listing_command: default_listing_command(),
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Web server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Control connection configuration.
    #[serde(default)]
    pub liquidsoap: LiquidsoapConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_yaml(&content)?;
        Ok(config)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate server bind address
        self.server.bind.parse::<IpAddr>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid server bind address: '{}'",
                self.server.bind
            ))
        })?;

        // Validate server port
        if self.server.port == 0 {
            return Err(ConfigError::Invalid(
                "server port must be non-zero".to_string(),
            ));
        }

        let path = &self.server.metrics_path;
        if !path.starts_with('/') || path.len() < 2 || path == HEALTH_PATH {
            return Err(ConfigError::Invalid(format!(
                "invalid metrics path: '{path}'"
            )));
        }

        if self.liquidsoap.connect_timeout.is_zero() || self.liquidsoap.command_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "liquidsoap timeouts must be non-zero".to_string(),
            ));
        }

        let listing = &self.liquidsoap.listing_command;
        if listing.trim().is_empty() || listing.contains('\n') {
            return Err(ConfigError::Invalid(format!(
                "invalid listing command: {listing:?}"
            )));
        }

        if let Endpoint::Tcp(addr) = &self.liquidsoap.endpoint {
            if !addr.contains(':') {
                return Err(ConfigError::Invalid(format!(
                    "liquidsoap tcp endpoint must be host:port, got '{addr}'"
                )));
            }
        }

        Ok(())
    }
}
