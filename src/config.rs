//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! The engine section carries the behaviors the spec leaves to the
//! implementer: NULL placement in group ordering, percentile
//! interpolation, and the contribution class thresholds.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::stats::PercentileMethod;
use crate::table::NullOrder;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Where NULL group keys sort: "first" or "last"
    #[serde(default)]
    pub null_order: NullOrder,

    /// Percentile interpolation: "linear" or "nearest_rank"
    #[serde(default)]
    pub percentile_method: PercentileMethod,

    /// Contribution class A cumulative-percentage ceiling
    #[serde(default = "default_class_a")]
    pub class_a_threshold: f64,

    /// Contribution class B cumulative-percentage ceiling
    #[serde(default = "default_class_b")]
    pub class_b_threshold: f64,
}

fn default_class_a() -> f64 {
    80.0
}

fn default_class_b() -> f64 {
    95.0
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            null_order: NullOrder::default(),
            percentile_method: PercentileMethod::default(),
            class_a_threshold: default_class_a(),
            class_b_threshold: default_class_b(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,

    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("lattice").join("config.toml")),
            Some(PathBuf::from("/etc/lattice/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // Engine overrides
        if let Ok(order) = std::env::var("LATTICE_NULL_ORDER") {
            match order.to_lowercase().as_str() {
                "first" => self.engine.null_order = NullOrder::First,
                "last" => self.engine.null_order = NullOrder::Last,
                other => tracing::warn!("Ignoring invalid LATTICE_NULL_ORDER '{}'", other),
            }
        }
        if let Ok(method) = std::env::var("LATTICE_PERCENTILE_METHOD") {
            match method.to_lowercase().as_str() {
                "linear" => self.engine.percentile_method = PercentileMethod::Linear,
                "nearest_rank" => self.engine.percentile_method = PercentileMethod::NearestRank,
                other => tracing::warn!("Ignoring invalid LATTICE_PERCENTILE_METHOD '{}'", other),
            }
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LATTICE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LATTICE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Lattice Configuration
#
# Environment variables override these settings:
# - LATTICE_NULL_ORDER
# - LATTICE_PERCENTILE_METHOD
# - LATTICE_LOG_LEVEL
# - LATTICE_LOG_FORMAT

[engine]
# Where NULL group keys sort in output ordering: "first" or "last"
null_order = "last"

# Percentile interpolation: "linear" or "nearest_rank"
percentile_method = "linear"

# Contribution analysis class ceilings (cumulative percentage)
class_a_threshold = 80.0
class_b_threshold = 95.0

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"

# Optional log file path
# file = "/var/log/lattice/lattice.log"
"#
    .to_string()
}
