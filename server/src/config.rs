//! Server configuration.

use serde::Deserialize;
use std::path::Path;

/// Configuration loaded from a TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub limits: LimitsConfig,
}

/// Buffering limits.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsConfig {
    /// Per-direction capacity of each stream data pipe.
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,

    /// I/O buffers to preallocate in the pool.
    #[serde(default = "default_buffer_reserve")]
    pub buffer_reserve: usize,
}

fn default_pipe_capacity() -> usize {
    64 * 1024
}

fn default_buffer_reserve() -> usize {
    16
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            pipe_capacity: default_pipe_capacity(),
            buffer_reserve: default_buffer_reserve(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

/// Logging configuration. `RUST_LOG` overrides `level`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Include the event target (module path) in output.
    #[serde(default)]
    pub target: bool,

    #[serde(default = "default_true")]
    pub thread_names: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            format: LogFormat::default(),
            timestamps: true,
            target: false,
            thread_names: true,
        }
    }
}

/// Errors from loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl Config {
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.limits.pipe_capacity, 64 * 1024);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parse_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [logging]
            level = "debug"
            format = "json"

            [limits]
            pipe_capacity = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.limits.pipe_capacity, 4096);
        assert_eq!(config.limits.buffer_reserve, 16);
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(toml::from_str::<Config>("[cache]\nsize = 1").is_err());
    }
}
