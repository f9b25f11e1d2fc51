//! Registry configuration

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings of a [`SharedObjectService`](crate::service::SharedObjectService)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Backend for persistent shared objects
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Which store backs persistent shared objects
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PersistenceConfig {
    /// Keep persistent objects in memory (lost on restart)
    #[default]
    Memory,
    /// One JSON file per object below `root`
    File {
        #[serde(default = "default_store_root")]
        root: PathBuf,
    },
}

fn default_store_root() -> PathBuf {
    PathBuf::from("sharedobjects")
}

impl ServiceConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Use a file store rooted at `root`
    pub fn with_file_store(mut self, root: impl Into<PathBuf>) -> Self {
        self.persistence = PersistenceConfig::File { root: root.into() };
        self
    }
}
