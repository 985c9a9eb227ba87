// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! The variants follow how far a failure is allowed to travel:
//! - configuration problems abort the run before anything is spawned,
//! - spawn failures are isolated to a single work unit,
//! - termination failures are logged per process and never re-raised.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConciergeError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("failed to launch work unit '{unit}': {source}")]
    SpawnError {
        unit: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate process {pid}: {message}")]
    TerminationError { pid: u32, message: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConciergeError {
    pub(crate) fn spawn(unit: impl Into<String>, source: std::io::Error) -> Self {
        ConciergeError::SpawnError {
            unit: unit.into(),
            source,
        }
    }

    pub(crate) fn termination(pid: u32, message: impl Into<String>) -> Self {
        ConciergeError::TerminationError {
            pid,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConciergeError>;
