// src/config/mod.rs

//! Configuration loading and validation for concierge.
//!
//! Responsibilities:
//! - Define the serde-backed data model (`model.rs`).
//! - Load a config file from disk or a mock filesystem (`loader.rs`).
//! - Turn the raw document into validated work units (`validate.rs`).
//! - Expose it behind the [`ConfigSource`] trait (`source.rs`).

pub mod loader;
pub mod model;
pub mod source;
pub mod validate;

pub use loader::{load_and_validate, load_and_validate_with, load_from_path_with, ConfigFormat};
pub use model::{ConfigFile, ConfigSection, EnvBlocks, RawConfigFile, Settings, UnitConfig};
pub use source::{ConfigSource, FileConfigSource};
pub use validate::parse_duration;
