//! Configuration loading errors and `${VAR}` expansion.

use std::sync::OnceLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Errors that can occur while loading the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// A value parsed but is not usable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Replace `${VAR}` and `${VAR:-default}` with values from the environment.
///
/// Unset variables without a default expand to the empty string.
pub fn expand_env_vars(input: &str) -> String {
    static REFERENCE: OnceLock<Regex> = OnceLock::new();

    let reference = REFERENCE.get_or_init(|| {
        Regex::new(r"\$\{(?P<name>[A-Za-z_][A-Za-z0-9_]*)(?::-(?P<default>[^}]*))?\}")
            .expect("env reference pattern is valid")
    });

    reference
        .replace_all(input, |caps: &Captures| {
            std::env::var(&caps["name"]).unwrap_or_else(|_| {
                caps.name("default")
                    .map_or_else(String::new, |m| m.as_str().to_owned())
            })
        })
        .into_owned()
}
