//! Input configuration
//!
//! ```toml
//! directory = "/data/mongo/host1"
//! database = "deepmr_test"
//! collection = "testcoll1"
//!
//! [locality]
//! block_size = 67108864
//! hosts = ["host1", "host1-replica"]
//! ```

use crate::error::Result;
use crate::fs::{LocalFileSystem, DEFAULT_BLOCK_SIZE};
use crate::validation::{CollectionName, DatabaseName};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where to find a collection on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Directory holding `{database}.ns` and the data files
    pub directory: PathBuf,
    pub database: String,
    /// Collection name without the database prefix
    pub collection: String,
    #[serde(default)]
    pub locality: LocalityConfig,
}

/// Block-location reporting of the local filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalityConfig {
    pub block_size: u64,
    /// Hosts reported for every range; empty means this machine
    pub hosts: Vec<String>,
}

impl Default for LocalityConfig {
    fn default() -> Self {
        LocalityConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            hosts: Vec::new(),
        }
    }
}

impl LocalityConfig {
    /// Local filesystem reporting these settings
    pub fn file_system(&self) -> LocalFileSystem {
        let fs = LocalFileSystem::new().with_block_size(self.block_size);
        if self.hosts.is_empty() {
            fs
        } else {
            fs.with_hosts(self.hosts.clone())
        }
    }
}

impl InputConfig {
    pub fn new(
        directory: impl Into<PathBuf>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Self {
        InputConfig {
            directory: directory.into(),
            database: database.into(),
            collection: collection.into(),
            locality: LocalityConfig::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: InputConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check both names
    pub fn validate(&self) -> Result<(DatabaseName, CollectionName)> {
        Ok((
            DatabaseName::new(self.database.as_str())?,
            CollectionName::new(self.collection.as_str())?,
        ))
    }

    /// Path of the catalog file
    pub fn catalog_path(&self) -> PathBuf {
        self.directory.join(format!("{}.ns", self.database))
    }

    /// Catalog key of the collection
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.database, self.collection)
    }
}
