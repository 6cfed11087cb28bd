//! # Extent Reader - Direct Reads of Document Database Data Files
//!
//! `extent-reader` reads a document database's raw on-disk files without a
//! running server. It walks the namespace catalog, follows a collection's
//! chain of blocks, and decodes the records inside each block, all through a
//! pluggable [`FileSystem`] so the same code reads local disks, test
//! fixtures, or any backend that can report where a file's bytes live.
//!
//! - **Catalog lookup** of a collection's first and last block
//! - **Lazy traversal**: block headers on demand, block buffers on first use
//! - **Work units**: one per block, tagged with the hosts storing it, and
//!   serializable so they can be shipped to independent workers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use extent_reader::{CollectionInput, LocalFileSystem, Result, UnitReader};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let fs = Arc::new(LocalFileSystem::new());
//!
//! let input = CollectionInput::builder()
//!     .directory("/data/mongo/host1")
//!     .database("deepmr_test")
//!     .collection("testcoll1")
//!     .build()?;
//!
//! for unit in input.plan(fs.clone())? {
//!     for item in UnitReader::new(unit, fs.as_ref()) {
//!         let (id, doc) = item?;
//!         println!("{} {}", id, doc);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Walking a Collection
//!
//! ```rust,no_run
//! use extent_reader::{Catalog, FileSystem, LocalFileSystem, Result};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<()> {
//! let fs: Arc<dyn FileSystem> = Arc::new(LocalFileSystem::new());
//! let catalog = Catalog::open(fs.as_ref(), Path::new("/data/mongo/host1/test.ns"))?;
//!
//! if let Some(users) = catalog.collection("test.users", fs.clone()) {
//!     for record in users.records() {
//!         let record = record?;
//!         println!("{}", record.payload()?.to_json());
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// Format implementation
pub mod core;

// Re-export core modules internally so crate:: paths in core still work
#[allow(unused_imports)]
pub(crate) use crate::core::{
    block, bson, catalog, collection, config, error, fs, location, path, reader, record, split,
    validation,
};

// Re-export core types that users need
pub use crate::core::{
    block::{Block, Records},
    bson::{Document, ObjectId, Value},
    catalog::{Catalog, CatalogEntry},
    collection::{Collection, CollectionRecords},
    config::{InputConfig, LocalityConfig},
    error::{ReaderError, Result},
    fs::{BlockLocation, FileSystem, LocalFileSystem, MemoryFileSystem},
    location::Location,
    reader::UnitReader,
    record::Record,
    split::WorkUnit,
    validation::{CollectionName, DatabaseName},
};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One collection selected as job input
///
/// Names are validated on construction. [`CollectionInput::plan`] turns the
/// input into work units, one per block of the collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInput {
    directory: PathBuf,
    database: DatabaseName,
    collection: CollectionName,
}

impl CollectionInput {
    pub fn new(
        directory: impl Into<PathBuf>,
        database: impl Into<String>,
        collection: impl Into<String>,
    ) -> Result<Self> {
        let input = CollectionInput {
            directory: directory.into(),
            database: DatabaseName::new(database)?,
            collection: CollectionName::new(collection)?,
        };

        info!(
            "Input set to collection {} in {}",
            input.qualified_name(),
            input.directory.display()
        );
        Ok(input)
    }

    pub fn builder() -> CollectionInputBuilder {
        CollectionInputBuilder::new()
    }

    pub fn from_config(config: &InputConfig) -> Result<Self> {
        Self::new(
            config.directory.clone(),
            config.database.as_str(),
            config.collection.as_str(),
        )
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn database(&self) -> &DatabaseName {
        &self.database
    }

    pub fn collection_name(&self) -> &CollectionName {
        &self.collection
    }

    /// `{database}.{collection}`, the catalog key
    pub fn qualified_name(&self) -> String {
        self.collection.qualified(&self.database)
    }

    /// `{directory}/{database}.ns`
    pub fn catalog_path(&self) -> PathBuf {
        self.directory.join(format!("{}.ns", self.database))
    }

    /// Open the catalog and look up the collection
    ///
    /// Fails with [`ReaderError::CatalogNotFound`] or
    /// [`ReaderError::CollectionNotFound`] when either is absent.
    pub fn open(&self, fs: Arc<dyn FileSystem>) -> Result<Collection> {
        let path = self.catalog_path();
        if !fs.exists(&path) {
            return Err(ReaderError::CatalogNotFound(path.display().to_string()));
        }

        let catalog = Catalog::open(fs.as_ref(), &path)?;
        let name = self.qualified_name();
        catalog
            .collection(&name, fs)
            .ok_or(ReaderError::CollectionNotFound(name))
    }

    /// Plan the work units of the collection
    ///
    /// A missing catalog, an unreadable catalog, or a collection the
    /// catalog does not know all give an empty plan. Corruption met while
    /// walking the block chain is an error.
    pub fn plan(&self, fs: Arc<dyn FileSystem>) -> Result<Vec<WorkUnit>> {
        info!("Searching for {}", self.catalog_path().display());

        let collection = match self.open(fs.clone()) {
            Ok(collection) => Some(collection),
            Err(e) if e.is_absent() => {
                info!("Could not find collection data: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let mut units = Vec::new();
        if let Some(collection) = collection {
            for block in collection.blocks() {
                let block = block?;
                info!(
                    "Found block {} offset {}",
                    block.path().display(),
                    block.offset()
                );
                units.push(WorkUnit::new(block, fs.as_ref())?);
            }
        }

        if units.is_empty() {
            info!("Could not find any data in collection {}", self.qualified_name());
            info!("There will be 0 input records");
        } else {
            debug!("Planned {} work units", units.len());
        }

        Ok(units)
    }
}

/// Builder for [`CollectionInput`]
///
/// # Examples
///
/// ```rust
/// use extent_reader::CollectionInput;
///
/// let input = CollectionInput::builder()
///     .directory("/mongo/host1")
///     .database("db")
///     .collection("users")
///     .build()
///     .unwrap();
///
/// assert_eq!(input.qualified_name(), "db.users");
/// ```
#[derive(Debug, Clone, Default)]
pub struct CollectionInputBuilder {
    directory: Option<PathBuf>,
    database: Option<String>,
    collection: Option<String>,
}

impl CollectionInputBuilder {
    pub fn new() -> Self {
        CollectionInputBuilder {
            directory: None,
            database: None,
            collection: None,
        }
    }

    /// Directory holding the catalog and data files
    pub fn directory<P: Into<PathBuf>>(mut self, directory: P) -> Self {
        self.directory = Some(directory.into());
        self
    }

    pub fn database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Collection name without the database prefix
    pub fn collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn build(self) -> Result<CollectionInput> {
        let directory = self.directory.ok_or_else(|| missing("directory"))?;
        let database = self.database.ok_or_else(|| missing("database"))?;
        let collection = self.collection.ok_or_else(|| missing("collection"))?;

        CollectionInput::new(directory, database, collection)
    }
}

fn missing(field: &str) -> ReaderError {
    ReaderError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("{} must be set", field),
    ))
}
