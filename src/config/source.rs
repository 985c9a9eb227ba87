// src/config/source.rs

//! Where work units come from.
//!
//! The supervisor only needs an ordered list of [`WorkUnit`]s; the
//! [`ConfigSource`] trait keeps the file format out of the core. The runner
//! uses [`FileConfigSource`], tests can build units directly.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::loader::load_and_validate_with;
use crate::config::model::ConfigFile;
use crate::errors::Result;
use crate::fs::{FileSystem, RealFileSystem};
use crate::unit::WorkUnit;

pub trait ConfigSource {
    /// Load and validate the full configuration.
    fn load_config(&self) -> Result<ConfigFile>;

    /// Just the work units, in launch order.
    fn load(&self) -> Result<Vec<WorkUnit>> {
        Ok(self.load_config()?.units)
    }
}

/// A config file read through a [`FileSystem`].
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_fs(path, Arc::new(RealFileSystem))
    }

    pub fn with_fs(path: impl Into<PathBuf>, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path: path.into(),
            fs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn load_config(&self) -> Result<ConfigFile> {
        load_and_validate_with(self.fs.as_ref(), &self.path)
    }
}
