//! Configuration file and data folder resolution
//!
//! Resolution priority for a path setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use std::path::{Path, PathBuf};

/// Database file name inside the data folder
pub const DATABASE_FILE_NAME: &str = "poc_turnos.db";

/// Locate the configuration file for `app_name`
///
/// Checks `<config dir>/<app_name>/config.toml`, then
/// `/etc/<app_name>/config.toml` on Linux.
pub fn find_config_file(app_name: &str) -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join(app_name).join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc").join(app_name).join("config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config(format!("No config file found for {}", app_name)))
}

/// Get OS-dependent default data folder
pub fn default_data_folder(app_name: &str) -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(app_name))
        .unwrap_or_else(|| PathBuf::from(format!("./{}_data", app_name)))
}

/// Default database path inside the data folder
pub fn default_database_path(app_name: &str) -> PathBuf {
    default_data_folder(app_name).join(DATABASE_FILE_NAME)
}

/// Resolve a path following the priority order in the module docs
pub fn resolve_path(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    config_value: Option<&Path>,
    default: impl FnOnce() -> PathBuf,
) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = config_value {
        return path.to_path_buf();
    }

    default()
}

/// Read a TOML file into a deserializable config struct
pub fn load_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse TOML {:?}: {}", path, e)))
}
