// src/config/loader.rs

use std::path::Path;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{ConciergeError, Result};
use crate::fs::{FileSystem, RealFileSystem};

/// Document formats understood by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are read as TOML; everything else as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Deserialize a config document without semantic validation.
pub fn parse_str(contents: &str, format: ConfigFormat) -> Result<RawConfigFile> {
    let config = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(contents)?,
        ConfigFormat::Toml => toml::from_str(contents)?,
    };
    Ok(config)
}

/// Load a configuration file through `fs` and return the raw document.
///
/// This only performs deserialization; use [`load_and_validate_with`] to get
/// a checked [`ConfigFile`].
pub fn load_from_path_with(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    if !fs.exists(path) {
        return Err(ConciergeError::ConfigError(format!(
            "config file {:?} does not exist",
            path
        )));
    }
    let contents = fs
        .read_to_string(path)
        .map_err(|e| ConciergeError::ConfigError(format!("{e:#}")))?;

    parse_str(&contents, ConfigFormat::from_path(path))
}

/// Load and validate a configuration file through `fs`.
pub fn load_and_validate_with(fs: &dyn FileSystem, path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path_with(fs, path)?;
    ConfigFile::try_from(raw_config)
}

/// Load and validate a configuration file from disk.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads YAML (or TOML for `.toml` paths).
/// - Applies defaults (handled by `serde` default functions).
/// - Checks for an empty `work` map, blank commands and bad durations.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    load_and_validate_with(&RealFileSystem, path)
}

