//! Bootstrap configuration for the shift-assignment service
//!
//! Settings come from a TOML file and cannot change while running.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--port`, `--database`, `--config`)
//! 2. Environment variables (`POC_PORT`, `POC_DATABASE`, `POC_CONFIG`)
//! 3. TOML configuration file
//! 4. Built-in defaults
//!
//! Clap folds 1 and 2 together, so [`ConfigOverrides`] already carries
//! whichever of the two was set.

use std::path::{Path, PathBuf};
use std::time::Duration;

use poc_common::config::{default_database_path, find_config_file, load_toml, resolve_path};
use poc_common::{Error, Result};
use serde::Deserialize;

use crate::roster::RosterSettings;

/// Application name used for config and data folder lookup
pub const APP_NAME: &str = "poc-turnos";

/// Contents of `poc-turnos.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// SQLite database file; defaults to the OS data folder
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Upper bound for a single engine operation, in milliseconds
    #[serde(default = "default_db_timeout_ms")]
    pub db_timeout_ms: u64,

    #[serde(default = "default_fairness_window_days")]
    pub fairness_window_days: u32,

    #[serde(default = "default_capacity")]
    pub default_capacity: u32,

    /// Fixed seed for suggestion tie-breaking (tests, reproducible demos)
    #[serde(default)]
    pub suggestion_seed: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            host: default_host(),
            port: default_port(),
            db_timeout_ms: default_db_timeout_ms(),
            fairness_window_days: default_fairness_window_days(),
            default_capacity: default_capacity(),
            suggestion_seed: None,
            logging: LoggingConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_db_timeout_ms() -> u64 {
    5000
}

fn default_fairness_window_days() -> u32 {
    30
}

fn default_capacity() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub port: Option<u16>,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub suggestion_seed: Option<u64>,
    pub roster: RosterSettings,
    /// TOML file the values came from; `None` when running on defaults
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the TOML file (if any) and apply overrides
    ///
    /// An explicitly named config file must exist. Without one, the
    /// standard locations are searched and built-in defaults apply when
    /// nothing is found.
    pub fn load(overrides: ConfigOverrides) -> Result<Self> {
        let config_file = match &overrides.config_path {
            Some(path) => Some(path.clone()),
            None => find_config_file(APP_NAME).ok(),
        };

        let toml_config = match &config_file {
            Some(path) => load_toml(path)?,
            None => TomlConfig::default(),
        };

        let mut config = Self::from_toml(toml_config, overrides)?;
        config.config_file = config_file;
        Ok(config)
    }

    /// Merge a parsed TOML file with overrides and validate the result
    pub fn from_toml(toml_config: TomlConfig, overrides: ConfigOverrides) -> Result<Self> {
        let database_path = resolve_path(
            overrides.database_path.as_deref(),
            "POC_DATABASE",
            toml_config.database_path.as_deref(),
            || default_database_path(APP_NAME),
        );
        let port = overrides.port.unwrap_or(toml_config.port);

        let config = Config {
            database_path,
            host: toml_config.host,
            port,
            log_level: toml_config.logging.level,
            suggestion_seed: toml_config.suggestion_seed,
            roster: RosterSettings {
                db_timeout: Duration::from_millis(toml_config.db_timeout_ms),
                fairness_window_days: toml_config.fairness_window_days,
                default_capacity: toml_config.default_capacity,
            },
            config_file: None,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::Config("port must be greater than 0".to_string()));
        }
        if self.roster.db_timeout.is_zero() {
            return Err(Error::Config("db_timeout_ms must be greater than 0".to_string()));
        }
        if self.roster.fairness_window_days == 0 {
            return Err(Error::Config("fairness_window_days must be greater than 0".to_string()));
        }
        if self.roster.default_capacity == 0 {
            return Err(Error::Config("default_capacity must be greater than 0".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Config("host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }
}
