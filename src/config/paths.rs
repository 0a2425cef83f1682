//! Platform-specific configuration paths.

use crate::config::Config;
use crate::constants::APP_NAME;
use crate::error::{Error, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

/// Get the configuration directory for the current platform.
///
/// - Linux: `~/.config/vista/`
/// - macOS: `~/Library/Application Support/vista/`
/// - Windows: `%APPDATA%\vista\`
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(Error::ConfigDirNotFound)
}

/// Get the full path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Directory that relative model artifact paths resolve against.
///
/// Uses `models.dir` from the config when set, else `<data dir>/models`.
pub fn models_dir(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.models.dir {
        return Ok(dir.clone());
    }

    ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().join("models"))
        .ok_or(Error::DataDirNotFound)
}
